use std::sync::Arc;

use super::chunk_execution_info;
use super::sum_chunk_weights;
use super::CollisionMap;
use crate::ChunkExecutionInfo;
use crate::MetastreamData;
use crate::MetastreamLookup;
use crate::OriginalStreamData;
use crate::Result;
use crate::ScavengeMap;

/// Read-only scavenge state handed to one chunk executor worker.
///
/// Workers never write state; the coordinating task resets chunk weights
/// after each chunk completes.
pub struct ChunkWorkerState {
    metastream_lookup: Arc<dyn MetastreamLookup>,
    metastreams: CollisionMap<MetastreamData>,
    original_streams: CollisionMap<OriginalStreamData>,
    chunk_weights: Arc<dyn ScavengeMap<u32, f32>>,
}

impl ChunkWorkerState {
    pub(super) fn new(
        metastream_lookup: Arc<dyn MetastreamLookup>,
        metastreams: CollisionMap<MetastreamData>,
        original_streams: CollisionMap<OriginalStreamData>,
        chunk_weights: Arc<dyn ScavengeMap<u32, f32>>,
    ) -> Self {
        Self {
            metastream_lookup,
            metastreams,
            original_streams,
            chunk_weights,
        }
    }

    pub fn metastream_lookup(&self) -> &Arc<dyn MetastreamLookup> {
        &self.metastream_lookup
    }

    pub fn sum_chunk_weights(
        &self,
        start_logical_chunk_number: u32,
        end_logical_chunk_number: u32,
    ) -> Result<f32> {
        sum_chunk_weights(
            self.chunk_weights.as_ref(),
            start_logical_chunk_number,
            end_logical_chunk_number,
        )
    }

    pub fn try_get_chunk_execution_info(
        &self,
        original_stream_id: &str,
    ) -> Result<Option<ChunkExecutionInfo>> {
        Ok(self
            .original_streams
            .get(original_stream_id)?
            .map(|data| chunk_execution_info(&data)))
    }

    pub fn try_get_metastream_data(
        &self,
        metastream_id: &str,
    ) -> Result<Option<MetastreamData>> {
        self.metastreams.get(metastream_id)
    }
}
