//! Drives one scavenge from the persisted checkpoint to completion.
//!
//! A fresh scavenge picks (or writes) a scavenge point and runs every phase in
//! order. An interrupted scavenge resumes the phase named by its checkpoint
//! and then runs the phases after it from scratch.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::Accumulator;
use super::Calculator;
use super::ChunkExecutor;
use super::ChunkMerger;
use super::Cleaner;
use super::IndexExecutor;
use crate::metrics::PHASE_DURATION_METRIC;
use crate::ExpectedVersion;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengeConfig;
use crate::ScavengePoint;
use crate::ScavengePointSource;
use crate::ScavengeResult;
use crate::ScavengeState;
use crate::ScavengerLog;
use crate::Throttle;

/// The six phases of a scavenge, in execution order.
pub struct ScavengerStages {
    pub accumulator: Arc<dyn Accumulator>,
    pub calculator: Arc<dyn Calculator>,
    pub chunk_executor: Arc<dyn ChunkExecutor>,
    pub index_executor: Arc<dyn IndexExecutor>,
    pub chunk_merger: Arc<dyn ChunkMerger>,
    pub cleaner: Arc<dyn Cleaner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Accumulation,
    Calculation,
    ChunkExecution,
    IndexExecution,
    ChunkMerging,
    Cleaning,
    Finished,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Accumulation => "accumulation",
            Phase::Calculation => "calculation",
            Phase::ChunkExecution => "chunk_execution",
            Phase::IndexExecution => "index_execution",
            Phase::ChunkMerging => "chunk_merging",
            Phase::Cleaning => "cleaning",
            Phase::Finished => "finished",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub struct Scavenger {
    state: ScavengeState,
    stages: ScavengerStages,
    scavenge_point_source: Arc<dyn ScavengePointSource>,
    throttle: Arc<Throttle>,
    log: Arc<dyn ScavengerLog>,

    threads: usize,
    merge_chunks: bool,
    threshold_for_new_scavenge: i32,
    sync_only: bool,
}

impl Scavenger {
    pub fn new(
        config: &ScavengeConfig,
        state: ScavengeState,
        stages: ScavengerStages,
        scavenge_point_source: Arc<dyn ScavengePointSource>,
        throttle: Arc<Throttle>,
        log: Arc<dyn ScavengerLog>,
    ) -> Self {
        Self {
            state,
            stages,
            scavenge_point_source,
            throttle,
            log,
            threads: config.threads,
            merge_chunks: config.merge_chunks,
            threshold_for_new_scavenge: config.threshold_for_new_scavenge,
            sync_only: config.sync_only,
        }
    }

    pub fn state(&self) -> &ScavengeState {
        &self.state
    }

    pub fn scavenge_id(&self) -> String {
        self.log.scavenge_id()
    }

    /// Runs (or resumes) a scavenge until it completes, fails or `cancel`
    /// fires. Never returns an error: the outcome is reported to the
    /// scavenger log and summarized by the returned [`ScavengeResult`].
    pub async fn scavenge(
        &self,
        cancel: &CancellationToken,
    ) -> ScavengeResult {
        let started = Instant::now();
        self.log.scavenge_started(self.threads, self.merge_chunks);

        let (result, error_message) = match self.run(cancel).await {
            Ok(()) => (ScavengeResult::Success, None),
            Err(e) if e.is_cancelled() => {
                info!("SCAVENGING: scavenge stopped");
                (ScavengeResult::Stopped, None)
            }
            Err(e) => {
                error!("SCAVENGING: scavenge failed: {:?}", e);
                (ScavengeResult::Errored, Some(e.to_string()))
            }
        };

        if let Err(e) = self.log.scavenge_completed(result, error_message, started.elapsed()) {
            warn!("SCAVENGING: failed to record scavenge completion: {:?}", e);
        }
        result
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.log_collisions("before");

        match self.state.checkpoint()? {
            None => {
                info!("SCAVENGING: started a new scavenge with no checkpoint");
                self.start_new(None, cancel).await?;
            }
            Some(ScavengeCheckpoint::Done { scavenge_point }) => {
                info!(
                    "SCAVENGING: started a new scavenge after {}",
                    scavenge_point.name()
                );
                self.start_new(Some(scavenge_point), cancel).await?;
            }
            Some(checkpoint) => {
                info!("SCAVENGING: resuming from checkpoint: {}", checkpoint);
                self.resume_from(checkpoint, cancel).await?;
            }
        }

        self.log_collisions("after");
        Ok(())
    }

    async fn start_new(
        &self,
        prev_scavenge_point: Option<ScavengePoint>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let latest = self
            .scavenge_point_source
            .get_latest_scavenge_point(cancel)
            .await?;

        let scavenge_point = match (latest, &prev_scavenge_point) {
            (None, _) => {
                if self.sync_only {
                    info!("SCAVENGING: no scavenge point to sync with, nothing to do");
                    return Ok(());
                }
                self.scavenge_point_source
                    .add_scavenge_point(
                        ExpectedVersion::NoStream,
                        self.threshold_for_new_scavenge,
                        cancel,
                    )
                    .await?
            }
            (Some(latest), None) => latest,
            (Some(latest), Some(prev)) if latest.event_number > prev.event_number => latest,
            (Some(latest), Some(_)) => {
                if self.sync_only {
                    info!(
                        "SCAVENGING: already scavenged up to {}, nothing to sync",
                        latest.name()
                    );
                    return Ok(());
                }
                self.scavenge_point_source
                    .add_scavenge_point(
                        ExpectedVersion::Exact(latest.event_number),
                        self.threshold_for_new_scavenge,
                        cancel,
                    )
                    .await?
            }
        };

        info!("SCAVENGING: scavenging up to {}", scavenge_point);

        self.timed(
            Phase::Accumulation,
            self.stages.accumulator.accumulate(
                prev_scavenge_point,
                &scavenge_point,
                &self.state,
                cancel,
            ),
        )
        .await?;

        self.start_phases(Phase::Calculation, &scavenge_point, cancel)
            .await
    }

    async fn resume_from(
        &self,
        checkpoint: ScavengeCheckpoint,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let scavenge_point = checkpoint.scavenge_point().clone();
        let sp = &scavenge_point;
        let state = &self.state;

        let next = match checkpoint {
            ScavengeCheckpoint::Accumulating {
                done_logical_chunk_number,
                ..
            } => {
                self.timed(
                    Phase::Accumulation,
                    self.stages
                        .accumulator
                        .resume(sp, done_logical_chunk_number, state, cancel),
                )
                .await?;
                Phase::Calculation
            }
            ScavengeCheckpoint::Calculating {
                done_stream_handle, ..
            } => {
                self.timed(
                    Phase::Calculation,
                    self.stages
                        .calculator
                        .resume(sp, done_stream_handle, state, cancel),
                )
                .await?;
                Phase::ChunkExecution
            }
            ScavengeCheckpoint::ExecutingChunks {
                done_logical_chunk_number,
                ..
            } => {
                self.timed(
                    Phase::ChunkExecution,
                    self.stages
                        .chunk_executor
                        .resume(sp, done_logical_chunk_number, state, cancel),
                )
                .await?;
                Phase::IndexExecution
            }
            ScavengeCheckpoint::ExecutingIndex { .. } => {
                self.timed(
                    Phase::IndexExecution,
                    self.stages.index_executor.resume(sp, state, cancel),
                )
                .await?;
                Phase::ChunkMerging
            }
            ScavengeCheckpoint::MergingChunks { .. } => {
                self.timed(
                    Phase::ChunkMerging,
                    self.stages.chunk_merger.resume(sp, state, cancel),
                )
                .await?;
                Phase::Cleaning
            }
            ScavengeCheckpoint::Cleaning { .. } => {
                self.timed(Phase::Cleaning, self.stages.cleaner.resume(sp, state, cancel))
                    .await?;
                Phase::Finished
            }
            ScavengeCheckpoint::Done { .. } => Phase::Finished,
        };

        self.start_phases(next, sp, cancel).await
    }

    /// Runs `first` and every later phase from scratch, then marks the
    /// scavenge point done.
    async fn start_phases(
        &self,
        first: Phase,
        scavenge_point: &ScavengePoint,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let state = &self.state;

        if first <= Phase::Calculation {
            self.timed(
                Phase::Calculation,
                self.stages.calculator.calculate(scavenge_point, state, cancel),
            )
            .await?;
        }

        if first <= Phase::ChunkExecution {
            self.timed(
                Phase::ChunkExecution,
                self.stages.chunk_executor.execute(scavenge_point, state, cancel),
            )
            .await?;
        }

        if first <= Phase::IndexExecution {
            self.timed(
                Phase::IndexExecution,
                self.stages.index_executor.execute(scavenge_point, state, cancel),
            )
            .await?;
        }

        if first <= Phase::ChunkMerging {
            self.timed(
                Phase::ChunkMerging,
                self.stages.chunk_merger.merge(scavenge_point, state, cancel),
            )
            .await?;
        }

        if first <= Phase::Cleaning {
            self.timed(
                Phase::Cleaning,
                self.stages.cleaner.clean(scavenge_point, state, cancel),
            )
            .await?;
        }

        state.set_checkpoint(ScavengeCheckpoint::Done {
            scavenge_point: scavenge_point.clone(),
        })?;
        info!("SCAVENGING: completed {}", scavenge_point.name());
        Ok(())
    }

    async fn timed<F>(
        &self,
        phase: Phase,
        work: F,
    ) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        debug!("SCAVENGING: {} started", phase);
        let started = Instant::now();
        let result = work.await;
        let elapsed = started.elapsed();

        PHASE_DURATION_METRIC
            .with_label_values(&[phase.label()])
            .observe(elapsed.as_secs_f64() * 1000.0);

        match self.state.stats() {
            Ok(stats) => debug!(
                "SCAVENGING: {} finished in {:?}. state: {}. {}",
                phase,
                elapsed,
                stats,
                self.throttle.pretty_stats()
            ),
            Err(e) => warn!("SCAVENGING: failed to read state stats: {:?}", e),
        }

        result
    }

    fn log_collisions(
        &self,
        when: &str,
    ) {
        let collisions = self.state.all_collisions();
        if collisions.is_empty() {
            debug!("SCAVENGING: no hash collisions {} scavenging", when);
        } else {
            info!(
                "SCAVENGING: {} hash collisions {} scavenging: {:?}",
                collisions.len(),
                when,
                collisions
            );
        }
    }
}
