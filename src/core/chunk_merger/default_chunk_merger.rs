use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;

use super::ChunkMerger;
use crate::ChunkManagerForMerger;
use crate::Error;
use crate::PhysicalChunkInfo;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengePoint;
use crate::ScavengeState;
use crate::ScavengerLog;
use crate::Throttle;

pub struct DefaultChunkMerger {
    chunk_size: u64,
    merge_chunks: bool,
    chunk_manager: Arc<dyn ChunkManagerForMerger>,
    throttle: Arc<Throttle>,
    log: Arc<dyn ScavengerLog>,
}

#[async_trait]
impl ChunkMerger for DefaultChunkMerger {
    async fn merge(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("SCAVENGING: started new chunk merge for {}", scavenge_point.name());
        state.set_checkpoint(ScavengeCheckpoint::MergingChunks {
            scavenge_point: scavenge_point.clone(),
        })?;
        self.resume(scavenge_point, state, cancel).await
    }

    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        _state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.merge_chunks {
            debug!("SCAVENGING: chunk merging is disabled");
            return Ok(());
        }

        let chunks = self
            .chunk_manager
            .physical_chunks_before(scavenge_point.position)?;
        for group in merge_groups(&chunks, self.chunk_size) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.merge_group(&group, cancel).await?;
            self.throttle.rest(cancel).await?;
        }
        Ok(())
    }
}

impl DefaultChunkMerger {
    pub fn new(
        chunk_size: u64,
        merge_chunks: bool,
        chunk_manager: Arc<dyn ChunkManagerForMerger>,
        throttle: Arc<Throttle>,
        log: Arc<dyn ScavengerLog>,
    ) -> Self {
        Self {
            chunk_size,
            merge_chunks,
            chunk_manager,
            throttle,
            log,
        }
    }

    async fn merge_group(
        &self,
        group: &[PhysicalChunkInfo],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            return Ok(());
        };
        let (start, end) = (first.chunk_start_number, last.chunk_end_number);
        let started = Instant::now();
        debug!("SCAVENGING: merging {} chunks into {}-{}", group.len(), start, end);

        match self.chunk_manager.merge_chunks(group, cancel).await {
            Ok(merged) => {
                let data_size: u64 = group.iter().map(|c| c.data_size).sum();
                let space_saved = data_size as i64 - merged.file_size as i64;
                debug!("SCAVENGING: merged chunk {} is {} bytes", merged.file_name, merged.file_size);
                self.log
                    .chunks_merged(start, end, started.elapsed(), space_saved);
                Ok(())
            }
            Err(e) => {
                if !e.is_cancelled() {
                    error!("SCAVENGING: failed to merge chunks {}-{}: {:?}", start, end, e);
                }
                self.log
                    .chunks_not_merged(start, end, started.elapsed(), &e.to_string());
                Err(e)
            }
        }
    }
}

/// Runs of two or more consecutive local chunks whose data fits in one chunk.
pub(crate) fn merge_groups(
    chunks: &[PhysicalChunkInfo],
    chunk_size: u64,
) -> Vec<Vec<PhysicalChunkInfo>> {
    let mut groups = Vec::new();
    let mut current: Vec<PhysicalChunkInfo> = Vec::new();
    let mut current_size = 0u64;

    let mut close = |current: &mut Vec<PhysicalChunkInfo>| {
        if current.len() >= 2 {
            groups.push(std::mem::take(current));
        } else {
            current.clear();
        }
    };

    for chunk in chunks {
        if chunk.is_remote {
            close(&mut current);
            current_size = 0;
            continue;
        }

        let follows = current
            .last()
            .map_or(true, |prev| prev.chunk_end_number + 1 == chunk.chunk_start_number);
        if !follows || current_size + chunk.data_size > chunk_size {
            close(&mut current);
            current_size = 0;
        }

        current_size += chunk.data_size;
        current.push(chunk.clone());
    }
    close(&mut current);

    groups
}
