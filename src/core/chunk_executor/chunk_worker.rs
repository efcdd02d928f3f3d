use std::sync::Arc;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use crate::ChunkExecutionInfo;
use crate::ChunkManagerForExecutor;
use crate::ChunkReaderForExecutor;
use crate::ChunkRemover;
use crate::ChunkWorkerState;
use crate::ChunkWriterForExecutor;
use crate::DiscardPoint;
use crate::Error;
use crate::ExecutorRecord;
use crate::PrepareRecord;
use crate::Result;
use crate::ScavengePoint;
use crate::ScavengerLog;

/// What the coordinating task must record for one physical chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkOutcome {
    pub(crate) chunk_start_number: u32,
    pub(crate) chunk_end_number: u32,
    pub(crate) reset_weights: bool,
}

/// Processes one physical chunk at a time. Shared by every worker task.
pub(crate) struct ChunkWorker {
    pub(crate) cancellation_check_period: usize,
    pub(crate) unsafe_ignore_hard_deletes: bool,
    pub(crate) chunk_manager: Arc<dyn ChunkManagerForExecutor>,
    pub(crate) chunk_remover: Arc<dyn ChunkRemover>,
    pub(crate) log: Arc<dyn ScavengerLog>,
}

impl ChunkWorker {
    pub(crate) async fn process(
        self: Arc<Self>,
        state: Arc<ChunkWorkerState>,
        chunk: Arc<dyn ChunkReaderForExecutor>,
        scavenge_point: ScavengePoint,
        cancel: CancellationToken,
    ) -> Result<ChunkOutcome> {
        let mut outcome = ChunkOutcome {
            chunk_start_number: chunk.chunk_start_number(),
            chunk_end_number: chunk.chunk_end_number(),
            reset_weights: false,
        };

        if chunk.is_remote() {
            debug!("SCAVENGING: skipping remote chunk {}", chunk.name());
            return Ok(outcome);
        }

        let weight = state.sum_chunk_weights(outcome.chunk_start_number, outcome.chunk_end_number)?;

        if self
            .chunk_remover
            .start_removing_if_not_retained(&scavenge_point, &state, chunk.as_ref())
            .await?
        {
            info!("SCAVENGING: chunk {} is being removed", chunk.name());
            outcome.reset_weights = true;
        } else if weight > scavenge_point.threshold as f32 || self.unsafe_ignore_hard_deletes {
            self.execute_chunk(&state, chunk.as_ref(), weight, &scavenge_point, &cancel)
                .await?;
            outcome.reset_weights = true;
        } else {
            debug!(
                "SCAVENGING: skipped chunk {} with weight {}. threshold is {}",
                chunk.name(),
                weight,
                scavenge_point.threshold
            );
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(outcome)
    }

    async fn execute_chunk(
        &self,
        state: &ChunkWorkerState,
        chunk: &dyn ChunkReaderForExecutor,
        weight: f32,
        scavenge_point: &ScavengePoint,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        let (start, end) = (chunk.chunk_start_number(), chunk.chunk_end_number());
        debug!(
            "SCAVENGING: started to scavenge chunk {} with weight {}. {} => {} ({} => {})",
            chunk.name(),
            weight,
            start,
            end,
            chunk.chunk_start_position(),
            chunk.chunk_end_position()
        );

        let mut writer = match self.chunk_manager.create_chunk_writer(chunk).await {
            Ok(writer) => writer,
            Err(e) => {
                self.log
                    .chunks_not_scavenged(start, end, started.elapsed(), &e.to_string());
                return Err(e);
            }
        };
        debug!("SCAVENGING: resulting temp chunk file {}", writer.local_file_name());

        let copied = self
            .copy_kept_records(state, chunk, writer.as_mut(), scavenge_point, cancel)
            .await;
        if let Err(e) = copied {
            if e.is_cancelled() {
                info!("SCAVENGING: cancelled at chunk {}", chunk.name());
            }
            self.log
                .chunks_not_scavenged(start, end, started.elapsed(), &e.to_string());
            writer.abort(!e.is_cancelled());
            return Err(e);
        }

        let completed = match writer.complete().await {
            Ok(completed) => completed,
            Err((writer, e)) => {
                self.log
                    .chunks_not_scavenged(start, end, started.elapsed(), &e.to_string());
                writer.abort(true);
                return Err(e);
            }
        };

        let space_saved = chunk.file_size() as i64 - completed.file_size as i64;
        debug!(
            "SCAVENGING: chunk {} scavenged into {}. old size {}, new size {}",
            chunk.name(),
            completed.file_name,
            chunk.file_size(),
            completed.file_size
        );
        self.log
            .chunks_scavenged(start, end, started.elapsed(), space_saved);
        Ok(())
    }

    async fn copy_kept_records(
        &self,
        state: &ChunkWorkerState,
        chunk: &dyn ChunkReaderForExecutor,
        writer: &mut dyn ChunkWriterForExecutor,
        scavenge_point: &ScavengePoint,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut kept = 0usize;
        let mut discarded = 0usize;
        let mut checks = 0usize;

        let mut records = chunk.read_records();
        while let Some(record) = records.next().await {
            let record = record?;
            let discard = match &record {
                ExecutorRecord::NonPrepare { .. } => false,
                ExecutorRecord::Prepare(prepare) => self.should_discard(state, scavenge_point, prepare)?,
            };
            if discard {
                discarded += 1;
            } else {
                kept += 1;
                writer.write_record(&record).await?;
            }

            checks += 1;
            if checks == self.cancellation_check_period {
                checks = 0;
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }
        }
        // never swap in a chunk once cancelled, however short
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!(
            "SCAVENGING: chunk {} traversed {} records. kept {}, discarded {}",
            chunk.name(),
            kept + discarded,
            kept,
            discarded
        );
        Ok(())
    }

    pub(crate) fn should_discard(
        &self,
        state: &ChunkWorkerState,
        scavenge_point: &ScavengePoint,
        record: &PrepareRecord,
    ) -> Result<bool> {
        if record.log_position >= scavenge_point.position {
            return Ok(false);
        }

        let details = execution_details(state, &record.stream_id)?;

        // explicit transactions: begin, data or end
        if !record.is_self_committed {
            if !details.is_tombstoned {
                return Ok(false);
            }
            if self.unsafe_ignore_hard_deletes {
                return Ok(true);
            }
            return Ok(!(record.is_tombstone || record.is_transaction_begin));
        }

        if details.is_tombstoned {
            if self.unsafe_ignore_hard_deletes {
                info!(
                    "SCAVENGING: removing hard deleted stream tombstone for stream {} at position {}",
                    record.stream_id, record.log_position
                );
                return Ok(true);
            }
            if state.metastream_lookup().is_metastream(&record.stream_id) {
                return Ok(true);
            }
        }

        if details.discard_point.should_discard(record.event_number) {
            return Ok(true);
        }
        if !details.maybe_discard_point.should_discard(record.event_number) {
            return Ok(false);
        }

        let Some(max_age) = details.max_age else {
            return Ok(false);
        };
        Ok(record.timestamp < scavenge_point.max_age_cutoff(max_age))
    }
}

fn execution_details(
    state: &ChunkWorkerState,
    stream_id: &str,
) -> Result<ChunkExecutionInfo> {
    if state.metastream_lookup().is_metastream(stream_id) {
        let data = state.try_get_metastream_data(stream_id)?.unwrap_or_default();
        return Ok(ChunkExecutionInfo {
            is_tombstoned: data.is_tombstoned,
            discard_point: data.discard_point,
            maybe_discard_point: DiscardPoint::KEEP_ALL,
            max_age: None,
        });
    }
    Ok(state
        .try_get_chunk_execution_info(stream_id)?
        .unwrap_or_default())
}
