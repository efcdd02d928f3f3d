use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::ChunkExecutor;
use super::ChunkOutcome;
use super::ChunkWorker;
use crate::ChunkManagerForExecutor;
use crate::ChunkReaderForExecutor;
use crate::ChunkRemover;
use crate::Error;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengeError;
use crate::ScavengePoint;
use crate::ScavengeState;
use crate::ScavengerLog;
use crate::Throttle;
use crate::MAX_EXECUTOR_THREADS;

pub struct DefaultChunkExecutor {
    chunk_size: u64,
    threads: usize,
    chunk_manager: Arc<dyn ChunkManagerForExecutor>,
    throttle: Arc<Throttle>,
    worker: Arc<ChunkWorker>,
}

#[async_trait]
impl ChunkExecutor for DefaultChunkExecutor {
    async fn execute(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("SCAVENGING: started new chunk execution for {}", scavenge_point.name());
        state.set_checkpoint(ScavengeCheckpoint::ExecutingChunks {
            scavenge_point: scavenge_point.clone(),
            done_logical_chunk_number: None,
        })?;
        self.resume(scavenge_point, None, state, cancel).await
    }

    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        done_logical_chunk_number: Option<u32>,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(
            "SCAVENGING: executing chunks for {} after chunk {:?}",
            scavenge_point.name(),
            done_logical_chunk_number
        );

        let start_from = done_logical_chunk_number.map_or(0, |done| done + 1);
        let chunks = self.physical_chunks(start_from, scavenge_point)?;

        let worker_states: Vec<_> = (0..self.threads)
            .map(|_| Arc::new(state.borrow_state_for_worker()))
            .collect();

        // workers stop with the caller's token, or as soon as this returns
        let worker_cancel = cancel.child_token();
        let _stop_workers = worker_cancel.clone().drop_guard();

        let mut outcomes = futures::stream::iter(0..chunks.len())
            .map(|i| {
                let chunk = chunks[i].clone();
                tokio::spawn(self.worker.clone().process(
                    worker_states[i % self.threads].clone(),
                    chunk,
                    scavenge_point.clone(),
                    worker_cancel.clone(),
                ))
            })
            .buffered(self.threads);

        while let Some(joined) = outcomes.next().await {
            let recorded = joined
                .map_err(Error::from)
                .and_then(|result| result)
                .and_then(|outcome| self.record_outcome(scavenge_point, outcome, state));
            if let Err(e) = recorded {
                if !e.is_cancelled() {
                    error!("SCAVENGING: chunk execution failed: {:?}", e);
                }
                worker_cancel.cancel();
                drain(outcomes).await;
                return Err(e);
            }

            // with more than one thread the executor runs unthrottled
            if self.threads == 1 {
                self.throttle.rest(cancel).await?;
            }
        }
        Ok(())
    }
}

/// Waits for the workers still in flight so that none of them swaps a chunk
/// in after the caller has been told the execution stopped.
async fn drain<S>(mut outcomes: S)
where
    S: Stream<Item = std::result::Result<Result<ChunkOutcome>, JoinError>> + Unpin,
{
    while let Some(joined) = outcomes.next().await {
        match joined.map_err(Error::from).and_then(|result| result) {
            Ok(outcome) => debug!(
                "SCAVENGING: chunks {} - {} finished after execution stopped",
                outcome.chunk_start_number, outcome.chunk_end_number
            ),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("SCAVENGING: chunk execution also failed: {:?}", e),
        }
    }
}

impl DefaultChunkExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chunk_size: u64,
        threads: usize,
        cancellation_check_period: usize,
        unsafe_ignore_hard_deletes: bool,
        chunk_manager: Arc<dyn ChunkManagerForExecutor>,
        chunk_remover: Arc<dyn ChunkRemover>,
        throttle: Arc<Throttle>,
        log: Arc<dyn ScavengerLog>,
    ) -> Self {
        let clamped = threads.clamp(1, MAX_EXECUTOR_THREADS);
        if clamped != threads {
            warn!(
                "SCAVENGING: {} executor threads requested, using {}",
                threads, clamped
            );
        }

        Self {
            chunk_size,
            threads: clamped,
            chunk_manager: chunk_manager.clone(),
            throttle,
            worker: Arc::new(ChunkWorker {
                cancellation_check_period: cancellation_check_period.max(1),
                unsafe_ignore_hard_deletes,
                chunk_manager,
                chunk_remover,
                log,
            }),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Physical chunks from `start_from` up to the one holding the scavenge
    /// point, all of which must be completed.
    fn physical_chunks(
        &self,
        start_from: u32,
        scavenge_point: &ScavengePoint,
    ) -> Result<Vec<Arc<dyn ChunkReaderForExecutor>>> {
        let mut chunks = Vec::new();
        let mut position = u64::from(start_from) * self.chunk_size;

        while position < scavenge_point.position {
            let chunk = self.chunk_manager.get_chunk_reader_for(position)?;
            if !chunk.is_read_only() {
                return Err(ScavengeError::OpenChunkBeforeScavengePoint {
                    chunk: chunk.name(),
                    scavenge_point: scavenge_point.name(),
                }
                .into());
            }
            position = chunk.chunk_end_position();
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    fn record_outcome(
        &self,
        scavenge_point: &ScavengePoint,
        outcome: ChunkOutcome,
        state: &ScavengeState,
    ) -> Result<()> {
        let transaction = state.begin_transaction()?;
        if outcome.reset_weights {
            state.reset_chunk_weights(outcome.chunk_start_number, outcome.chunk_end_number)?;
        }
        transaction.commit(ScavengeCheckpoint::ExecutingChunks {
            scavenge_point: scavenge_point.clone(),
            done_logical_chunk_number: Some(outcome.chunk_end_number),
        })
    }
}
