use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Size and span of one completed physical chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalChunkInfo {
    pub name: String,
    pub chunk_start_number: u32,
    /// Inclusive
    pub chunk_end_number: u32,
    /// Bytes of record data, excluding header and footer
    pub data_size: u64,
    pub is_remote: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedChunk {
    pub file_name: String,
    pub file_size: u64,
}

#[async_trait]
pub trait ChunkManagerForMerger: Send + Sync + 'static {
    /// Completed physical chunks starting before `position`, in log order
    fn physical_chunks_before(
        &self,
        position: u64,
    ) -> Result<Vec<PhysicalChunkInfo>>;

    /// Replace consecutive `chunks` with a single physical chunk
    async fn merge_chunks(
        &self,
        chunks: &[PhysicalChunkInfo],
        cancel: &CancellationToken,
    ) -> Result<MergedChunk>;
}
