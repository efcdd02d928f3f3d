use std::sync::Arc;

use crate::ChunkTimeStampRange;
use crate::MetastreamData;
use crate::OriginalStreamData;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengeMap;
use crate::StreamId;

/// The full set of maps making up the scavenge state, plus the transaction
/// spanning them.
///
/// At most one transaction is open at a time. Committing makes every write
/// since `begin_transaction` durable together; rolling back discards them.
pub trait ScavengeStateBackend: Send + Sync + 'static {
    /// First stream seen with each hash
    fn hash_users(&self) -> Arc<dyn ScavengeMap<u64, StreamId>>;

    /// Every stream whose hash is shared with another stream
    fn collisions(&self) -> Arc<dyn ScavengeMap<StreamId, ()>>;

    fn metastreams_by_hash(&self) -> Arc<dyn ScavengeMap<u64, MetastreamData>>;

    fn metastreams_by_id(&self) -> Arc<dyn ScavengeMap<StreamId, MetastreamData>>;

    fn original_streams_by_hash(&self) -> Arc<dyn ScavengeMap<u64, OriginalStreamData>>;

    fn original_streams_by_id(&self) -> Arc<dyn ScavengeMap<StreamId, OriginalStreamData>>;

    fn chunk_time_stamp_ranges(&self) -> Arc<dyn ScavengeMap<u32, ChunkTimeStampRange>>;

    fn chunk_weights(&self) -> Arc<dyn ScavengeMap<u32, f32>>;

    fn checkpoints(&self) -> Arc<dyn ScavengeMap<(), ScavengeCheckpoint>>;

    fn begin_transaction(&self) -> Result<()>;

    fn commit_transaction(&self) -> Result<()>;

    fn rollback_transaction(&self) -> Result<()>;

    /// One line summary of the stored row counts
    fn stats(&self) -> Result<String> {
        Ok(format!(
            "hash users: {}, collisions: {}, metastreams: {}+{}, original streams: {}+{}, \
             chunk ranges: {}, chunk weights: {}",
            self.hash_users().len()?,
            self.collisions().len()?,
            self.metastreams_by_hash().len()?,
            self.metastreams_by_id().len()?,
            self.original_streams_by_hash().len()?,
            self.original_streams_by_id().len()?,
            self.chunk_time_stamp_ranges().len()?,
            self.chunk_weights().len()?,
        ))
    }
}
