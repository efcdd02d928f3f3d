use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use tracing::trace;

use super::init_sled_scavenge_state_db;
use super::SledScavengeMap;
use super::SledWriteOverlay;
use crate::constants::*;
use crate::ChunkTimeStampRange;
use crate::MetastreamData;
use crate::OriginalStreamData;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengeMap;
use crate::ScavengeStateBackend;
use crate::StreamId;

/// Durable scavenge state in a single sled tree.
///
/// Writes inside a transaction are staged in memory and applied on commit as
/// one `sled::Batch`, followed by a flush. Readers see staged writes.
pub struct SledScavengeStateBackend {
    tree: sled::Tree,
    overlay: Arc<SledWriteOverlay>,
    hash_users: Arc<SledScavengeMap<u64, StreamId>>,
    collisions: Arc<SledScavengeMap<StreamId, ()>>,
    metastreams_by_hash: Arc<SledScavengeMap<u64, MetastreamData>>,
    metastreams_by_id: Arc<SledScavengeMap<StreamId, MetastreamData>>,
    original_streams_by_hash: Arc<SledScavengeMap<u64, OriginalStreamData>>,
    original_streams_by_id: Arc<SledScavengeMap<StreamId, OriginalStreamData>>,
    chunk_time_stamp_ranges: Arc<SledScavengeMap<u32, ChunkTimeStampRange>>,
    chunk_weights: Arc<SledScavengeMap<u32, f32>>,
    checkpoints: Arc<SledScavengeMap<(), ScavengeCheckpoint>>,
}

impl SledScavengeStateBackend {
    pub fn open(
        sled_db_root_path: impl AsRef<Path> + std::fmt::Debug,
        cache_capacity: u64,
    ) -> Result<Self> {
        let db = init_sled_scavenge_state_db(sled_db_root_path, cache_capacity)?;
        let tree = db.open_tree(SCAVENGE_STATE_TREE)?;
        debug!("opened scavenge state tree with {} rows", tree.len());
        Ok(Self::new(tree))
    }

    pub fn new(tree: sled::Tree) -> Self {
        let overlay = Arc::new(SledWriteOverlay::default());
        let map = |prefix| SledMapFactory {
            tree: tree.clone(),
            overlay: overlay.clone(),
            prefix,
        };
        Self {
            hash_users: map(HASH_USERS_PREFIX).build(),
            collisions: map(COLLISIONS_PREFIX).build(),
            metastreams_by_hash: map(METASTREAMS_BY_HASH_PREFIX).build(),
            metastreams_by_id: map(METASTREAMS_BY_ID_PREFIX).build(),
            original_streams_by_hash: map(ORIGINAL_STREAMS_BY_HASH_PREFIX).build(),
            original_streams_by_id: map(ORIGINAL_STREAMS_BY_ID_PREFIX).build(),
            chunk_time_stamp_ranges: map(CHUNK_TIME_STAMP_RANGES_PREFIX).build(),
            chunk_weights: map(CHUNK_WEIGHTS_PREFIX).build(),
            checkpoints: map(CHECKPOINT_PREFIX).build(),
            tree,
            overlay,
        }
    }
}

struct SledMapFactory {
    tree: sled::Tree,
    overlay: Arc<SledWriteOverlay>,
    prefix: u8,
}

impl SledMapFactory {
    fn build<K, V>(self) -> Arc<SledScavengeMap<K, V>>
    where
        K: crate::StateKey,
        V: crate::StateValue,
    {
        Arc::new(SledScavengeMap::new(self.tree, self.prefix, self.overlay))
    }
}

impl ScavengeStateBackend for SledScavengeStateBackend {
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
        trace!("sled backend: begin transaction");
        self.overlay.begin()
    }

    fn commit_transaction(&self) -> Result<()> {
        let pending = self.overlay.take()?;
        trace!("sled backend: commit transaction with {} writes", pending.len());

        let mut batch = sled::Batch::default();
        for (key, value) in pending {
            match value {
                Some(value) => batch.insert(key, value),
                None => batch.remove(key),
            }
        }
        self.tree.apply_batch(batch)?;
        self.tree.flush()?;
        Ok(())
    }

    fn rollback_transaction(&self) -> Result<()> {
        let pending = self.overlay.take()?;
        trace!("sled backend: rollback discards {} writes", pending.len());
        Ok(())
    }
}
