use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::ChunkWorkerState;
use crate::Error;
use crate::ExecutorRecord;
use crate::Result;
use crate::ScavengePoint;

/// Locates physical chunks and creates their replacements.
#[async_trait]
pub trait ChunkManagerForExecutor: Send + Sync + 'static {
    /// The physical chunk containing `position`
    fn get_chunk_reader_for(
        &self,
        position: u64,
    ) -> Result<Arc<dyn ChunkReaderForExecutor>>;

    /// A writer producing the scavenged replacement of `source`
    async fn create_chunk_writer(
        &self,
        source: &dyn ChunkReaderForExecutor,
    ) -> Result<Box<dyn ChunkWriterForExecutor>>;
}

/// Read access to one physical chunk, which covers one or more consecutive
/// logical chunks.
pub trait ChunkReaderForExecutor: Send + Sync + 'static {
    fn name(&self) -> String;

    fn file_size(&self) -> u64;

    fn chunk_start_number(&self) -> u32;

    /// Inclusive
    fn chunk_end_number(&self) -> u32;

    fn chunk_start_position(&self) -> u64;

    /// Exclusive
    fn chunk_end_position(&self) -> u64;

    /// Completed chunks are read only; only those can be scavenged
    fn is_read_only(&self) -> bool;

    /// Chunks held in an archive are never rewritten locally
    fn is_remote(&self) -> bool;

    fn read_records(&self) -> BoxStream<'_, Result<ExecutorRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedChunk {
    pub file_name: String,
    pub file_size: u64,
}

/// A writer that failed to complete comes back with the error so that it can
/// still be aborted.
pub type CompleteResult = std::result::Result<CompletedChunk, (Box<dyn ChunkWriterForExecutor>, Error)>;

/// Builds a replacement chunk. Exactly one of `complete` or `abort` is called.
#[async_trait]
pub trait ChunkWriterForExecutor: Send + 'static {
    fn local_file_name(&self) -> String;

    async fn write_record(
        &mut self,
        record: &ExecutorRecord,
    ) -> Result<()>;

    /// Atomically swap the new chunk in for the old one. On failure the old
    /// chunk stays in place and the writer is handed back.
    async fn complete(self: Box<Self>) -> CompleteResult;

    /// Drop the partial chunk. `delete_immediately` is false when the scavenge
    /// was cancelled, leaving the file for the next startup to clean up.
    fn abort(
        self: Box<Self>,
        delete_immediately: bool,
    );
}

/// Gives an archiving deployment the chance to remove a whole chunk instead
/// of rewriting it.
#[async_trait]
pub trait ChunkRemover: Send + Sync + 'static {
    /// Returns true when the chunk is being removed; its weight is then reset
    /// and it is not executed.
    async fn start_removing_if_not_retained(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ChunkWorkerState,
        chunk: &dyn ChunkReaderForExecutor,
    ) -> Result<bool>;
}

/// Never removes chunks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChunkRemover;

#[async_trait]
impl ChunkRemover for NoopChunkRemover {
    async fn start_removing_if_not_retained(
        &self,
        _scavenge_point: &ScavengePoint,
        _state: &ChunkWorkerState,
        _chunk: &dyn ChunkReaderForExecutor,
    ) -> Result<bool> {
        Ok(false)
    }
}
