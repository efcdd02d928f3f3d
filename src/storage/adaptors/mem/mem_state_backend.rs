use std::sync::Arc;

use tracing::trace;

use super::MemoryScavengeMap;
use super::UndoLog;
use crate::ChunkTimeStampRange;
use crate::MetastreamData;
use crate::OriginalStreamData;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengeMap;
use crate::ScavengeStateBackend;
use crate::StreamId;

/// Unified in-memory scavenge state. Rollback replays the undo log.
pub struct MemoryScavengeStateBackend {
    undo: Arc<UndoLog>,
    hash_users: Arc<MemoryScavengeMap<u64, StreamId>>,
    collisions: Arc<MemoryScavengeMap<StreamId, ()>>,
    metastreams_by_hash: Arc<MemoryScavengeMap<u64, MetastreamData>>,
    metastreams_by_id: Arc<MemoryScavengeMap<StreamId, MetastreamData>>,
    original_streams_by_hash: Arc<MemoryScavengeMap<u64, OriginalStreamData>>,
    original_streams_by_id: Arc<MemoryScavengeMap<StreamId, OriginalStreamData>>,
    chunk_time_stamp_ranges: Arc<MemoryScavengeMap<u32, ChunkTimeStampRange>>,
    chunk_weights: Arc<MemoryScavengeMap<u32, f32>>,
    checkpoints: Arc<MemoryScavengeMap<(), ScavengeCheckpoint>>,
}

impl Default for MemoryScavengeStateBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScavengeStateBackend {
    pub fn new() -> Self {
        let undo = Arc::new(UndoLog::default());
        Self {
            hash_users: Arc::new(MemoryScavengeMap::new(undo.clone())),
            collisions: Arc::new(MemoryScavengeMap::new(undo.clone())),
            metastreams_by_hash: Arc::new(MemoryScavengeMap::new(undo.clone())),
            metastreams_by_id: Arc::new(MemoryScavengeMap::new(undo.clone())),
            original_streams_by_hash: Arc::new(MemoryScavengeMap::new(undo.clone())),
            original_streams_by_id: Arc::new(MemoryScavengeMap::new(undo.clone())),
            chunk_time_stamp_ranges: Arc::new(MemoryScavengeMap::new(undo.clone())),
            chunk_weights: Arc::new(MemoryScavengeMap::new(undo.clone())),
            checkpoints: Arc::new(MemoryScavengeMap::new(undo.clone())),
            undo,
        }
    }
}

impl ScavengeStateBackend for MemoryScavengeStateBackend {
    fn hash_users(&self) -> Arc<dyn ScavengeMap<u64, StreamId>> {
        self.hash_users.clone()
    }

    fn collisions(&self) -> Arc<dyn ScavengeMap<StreamId, ()>> {
        self.collisions.clone()
    }

    fn metastreams_by_hash(&self) -> Arc<dyn ScavengeMap<u64, MetastreamData>> {
        self.metastreams_by_hash.clone()
    }

    fn metastreams_by_id(&self) -> Arc<dyn ScavengeMap<StreamId, MetastreamData>> {
        self.metastreams_by_id.clone()
    }

    fn original_streams_by_hash(&self) -> Arc<dyn ScavengeMap<u64, OriginalStreamData>> {
        self.original_streams_by_hash.clone()
    }

    fn original_streams_by_id(&self) -> Arc<dyn ScavengeMap<StreamId, OriginalStreamData>> {
        self.original_streams_by_id.clone()
    }

    fn chunk_time_stamp_ranges(&self) -> Arc<dyn ScavengeMap<u32, ChunkTimeStampRange>> {
        self.chunk_time_stamp_ranges.clone()
    }

    fn chunk_weights(&self) -> Arc<dyn ScavengeMap<u32, f32>> {
        self.chunk_weights.clone()
    }

    fn checkpoints(&self) -> Arc<dyn ScavengeMap<(), ScavengeCheckpoint>> {
        self.checkpoints.clone()
    }

    fn begin_transaction(&self) -> Result<()> {
        trace!("memory backend: begin transaction");
        self.undo.begin()
    }

    fn commit_transaction(&self) -> Result<()> {
        trace!("memory backend: commit transaction");
        self.undo.commit()
    }

    fn rollback_transaction(&self) -> Result<()> {
        trace!("memory backend: rollback transaction");
        self.undo.rollback()
    }
}
