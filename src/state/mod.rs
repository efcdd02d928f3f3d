//! The scavenge state: everything a scavenge learns about the log, kept
//! across runs so that each scavenge only reads the log written since the
//! previous scavenge point.

mod chunk_worker_state;
mod collision_detector;
mod collision_map;
mod transaction;

pub use chunk_worker_state::*;
pub use collision_detector::*;
pub use collision_map::*;
pub use transaction::*;


use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;
use tracing::error;

use crate::CalculationStatus;
use crate::ChunkExecutionInfo;
use crate::ChunkTimeStampRange;
use crate::DiscardPoint;
use crate::IndexExecutionInfo;
use crate::LongHasher;
use crate::MetastreamData;
use crate::MetastreamLookup;
use crate::OriginalStreamData;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengeError;
use crate::ScavengeMap;
use crate::ScavengeStateBackend;
use crate::StreamHandle;
use crate::StreamId;
use crate::StreamMetadata;

pub struct ScavengeState {
    backend: Arc<dyn ScavengeStateBackend>,
    hasher: Arc<dyn LongHasher>,
    metastream_lookup: Arc<dyn MetastreamLookup>,
    collision_detector: Arc<CollisionDetector>,
    metastreams: CollisionMap<MetastreamData>,
    original_streams: CollisionMap<OriginalStreamData>,
    chunk_time_stamp_ranges: Arc<dyn ScavengeMap<u32, ChunkTimeStampRange>>,
    chunk_weights: Arc<dyn ScavengeMap<u32, f32>>,
    checkpoints: Arc<dyn ScavengeMap<(), ScavengeCheckpoint>>,
    in_transaction: AtomicBool,
}

impl ScavengeState {
    pub fn new(
        backend: Arc<dyn ScavengeStateBackend>,
        hasher: Arc<dyn LongHasher>,
        metastream_lookup: Arc<dyn MetastreamLookup>,
    ) -> Result<Self> {
        let collision_detector = Arc::new(CollisionDetector::new(
            hasher.clone(),
            backend.hash_users(),
            backend.collisions(),
        )?);

        Ok(Self {
            metastreams: CollisionMap::new(
                hasher.clone(),
                collision_detector.clone(),
                backend.metastreams_by_hash(),
                backend.metastreams_by_id(),
            ),
            original_streams: CollisionMap::new(
                hasher.clone(),
                collision_detector.clone(),
                backend.original_streams_by_hash(),
                backend.original_streams_by_id(),
            ),
            chunk_time_stamp_ranges: backend.chunk_time_stamp_ranges(),
            chunk_weights: backend.chunk_weights(),
            checkpoints: backend.checkpoints(),
            collision_detector,
            backend,
            hasher,
            metastream_lookup,
            in_transaction: AtomicBool::new(false),
        })
    }

    pub fn hasher(&self) -> &Arc<dyn LongHasher> {
        &self.hasher
    }

    pub fn metastream_lookup(&self) -> &Arc<dyn MetastreamLookup> {
        &self.metastream_lookup
    }

    //-----------------------------------------------------------
    // Transactions and checkpoints

    pub fn begin_transaction(&self) -> Result<ScavengeTransaction<'_>> {
        if self.in_transaction.swap(true, Ordering::SeqCst) {
            return Err(ScavengeError::TransactionAlreadyOpen.into());
        }
        if let Err(e) = self.backend.begin_transaction() {
            self.in_transaction.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(ScavengeTransaction::new(self))
    }

    fn commit_with_checkpoint(
        &self,
        checkpoint: ScavengeCheckpoint,
    ) -> Result<()> {
        if let Err(e) = self.checkpoints.insert((), checkpoint) {
            if let Err(rollback_err) = self.rollback_transaction() {
                error!("rollback after failed checkpoint write failed: {:?}", rollback_err);
            }
            return Err(e);
        }

        self.in_transaction.store(false, Ordering::SeqCst);
        if let Err(e) = self.backend.commit_transaction() {
            // nothing was applied; cached collisions may include unapplied ones
            self.collision_detector.reload()?;
            return Err(e);
        }
        Ok(())
    }

    fn rollback_transaction(&self) -> Result<()> {
        self.in_transaction.store(false, Ordering::SeqCst);
        let result = self.backend.rollback_transaction();
        self.collision_detector.reload()?;
        result
    }

    pub fn checkpoint(&self) -> Result<Option<ScavengeCheckpoint>> {
        self.checkpoints.get(&())
    }

    pub fn set_checkpoint(
        &self,
        checkpoint: ScavengeCheckpoint,
    ) -> Result<()> {
        debug!("SCAVENGING: setting checkpoint {}", checkpoint);
        self.begin_transaction()?.commit(checkpoint)
    }

    //-----------------------------------------------------------
    // Collisions

    pub fn all_collisions(&self) -> Vec<StreamId> {
        self.collision_detector.all_collisions()
    }

    /// Registers the stream's hash. On a new collision, the previous owner of
    /// the hash has its rows moved to the id-keyed maps.
    pub fn detect_collisions(
        &self,
        stream_id: &str,
    ) -> Result<()> {
        if let CollisionResult::NewCollision { previous_user } =
            self.collision_detector.detect_collisions(stream_id)?
        {
            self.metastreams.notify_collision(&previous_user)?;
            self.original_streams.notify_collision(&previous_user)?;
        }
        Ok(())
    }

    pub fn is_collision_hash(
        &self,
        hash: u64,
    ) -> bool {
        self.collision_detector.is_collision_hash(hash)
    }

    pub fn lookup_unique_hash_user(
        &self,
        hash: u64,
    ) -> Result<StreamId> {
        self.collision_detector.lookup_unique_hash_user(hash)
    }

    pub fn get_stream_handle(
        &self,
        stream_id: &str,
    ) -> StreamHandle {
        self.original_streams.handle_for(stream_id)
    }

    //-----------------------------------------------------------
    // Accumulation

    pub fn set_metastream_discard_point(
        &self,
        metastream_id: &str,
        discard_point: DiscardPoint,
    ) -> Result<()> {
        self.metastreams
            .update(metastream_id, |data| data.discard_point = discard_point)
    }

    pub fn set_metastream_tombstone(
        &self,
        metastream_id: &str,
    ) -> Result<()> {
        self.metastreams
            .update(metastream_id, |data| data.is_tombstoned = true)
    }

    pub fn set_original_stream_metadata(
        &self,
        original_stream_id: &str,
        metadata: &StreamMetadata,
    ) -> Result<()> {
        self.original_streams.update(original_stream_id, |data| {
            data.max_age = metadata.max_age;
            data.max_count = metadata.max_count;
            data.truncate_before = metadata.truncate_before;
            data.status = CalculationStatus::Active;
        })
    }

    pub fn set_original_stream_tombstone(
        &self,
        original_stream_id: &str,
    ) -> Result<()> {
        self.original_streams.update(original_stream_id, |data| {
            data.is_tombstoned = true;
            data.status = CalculationStatus::Active;
        })
    }

    pub fn set_chunk_time_stamp_range(
        &self,
        logical_chunk_number: u32,
        range: ChunkTimeStampRange,
    ) -> Result<()> {
        self.chunk_time_stamp_ranges.insert(logical_chunk_number, range)
    }

    pub fn increase_chunk_weight(
        &self,
        logical_chunk_number: u32,
        extra_weight: f32,
    ) -> Result<()> {
        let weight = self.chunk_weights.get(&logical_chunk_number)?.unwrap_or(0.0);
        self.chunk_weights
            .insert(logical_chunk_number, weight + extra_weight)
    }

    //-----------------------------------------------------------
    // Calculation

    /// Active original streams after `after`, in handle order
    pub fn original_streams_to_calculate(
        &self,
        after: Option<&StreamHandle>,
        limit: usize,
    ) -> Result<Vec<(StreamHandle, OriginalStreamData)>> {
        self.original_streams.scan_after(after, limit, &|data| {
            data.status == CalculationStatus::Active
        })
    }

    pub fn set_original_stream_discard_points(
        &self,
        handle: &StreamHandle,
        status: CalculationStatus,
        discard_point: DiscardPoint,
        maybe_discard_point: DiscardPoint,
    ) -> Result<()> {
        self.original_streams.update_by_handle(handle, |data| {
            data.status = status;
            data.discard_point = discard_point;
            data.maybe_discard_point = maybe_discard_point;
        })
    }

    pub fn try_get_chunk_time_stamp_range(
        &self,
        logical_chunk_number: u32,
    ) -> Result<Option<ChunkTimeStampRange>> {
        self.chunk_time_stamp_ranges.get(&logical_chunk_number)
    }

    pub fn try_get_original_stream_data(
        &self,
        original_stream_id: &str,
    ) -> Result<Option<OriginalStreamData>> {
        self.original_streams.get(original_stream_id)
    }

    //-----------------------------------------------------------
    // Execution

    /// A view for one chunk executor worker. The collision set is frozen at
    /// this point; it cannot change while chunks are executed.
    pub fn borrow_state_for_worker(&self) -> ChunkWorkerState {
        let collisions: Arc<dyn CollisionSet> = Arc::new(self.collision_detector.snapshot());
        ChunkWorkerState::new(
            self.metastream_lookup.clone(),
            CollisionMap::new(
                self.hasher.clone(),
                collisions.clone(),
                self.backend.metastreams_by_hash(),
                self.backend.metastreams_by_id(),
            ),
            CollisionMap::new(
                self.hasher.clone(),
                collisions,
                self.backend.original_streams_by_hash(),
                self.backend.original_streams_by_id(),
            ),
            self.chunk_weights.clone(),
        )
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

    pub fn reset_chunk_weights(
        &self,
        start_logical_chunk_number: u32,
        end_logical_chunk_number: u32,
    ) -> Result<()> {
        for chunk in start_logical_chunk_number..=end_logical_chunk_number {
            self.chunk_weights.remove(&chunk)?;
        }
        Ok(())
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

    /// Discard information for an index entry's stream.
    ///
    /// A hash handle does not say whether the stream is a metastream, so both
    /// maps are consulted; an id handle names its map.
    pub fn try_get_index_execution_info(
        &self,
        handle: &StreamHandle,
    ) -> Result<Option<IndexExecutionInfo>> {
        let check_original = match handle {
            StreamHandle::Hash(_) => true,
            StreamHandle::Id(id) => !self.metastream_lookup.is_metastream(id),
        };

        if check_original {
            if let Some(data) = self.original_streams.get_by_handle(handle)? {
                return Ok(Some(IndexExecutionInfo {
                    is_metastream: false,
                    is_tombstoned: data.is_tombstoned,
                    discard_point: data.discard_point,
                }));
            }
            if matches!(handle, StreamHandle::Id(_)) {
                return Ok(None);
            }
        }

        Ok(self
            .metastreams
            .get_by_handle(handle)?
            .map(|data| IndexExecutionInfo {
                is_metastream: true,
                is_tombstoned: data.is_tombstoned,
                discard_point: data.discard_point,
            }))
    }

    //-----------------------------------------------------------
    // Cleaning

    pub fn all_chunks_executed(&self) -> Result<bool> {
        Ok(self
            .chunk_weights
            .scan_after(None, 1, &|weight| *weight != 0.0)?
            .is_empty())
    }

    /// Removes rows of tombstoned streams, and of limitless streams when
    /// `delete_archived` is set.
    pub fn delete_original_stream_data(
        &self,
        delete_archived: bool,
    ) -> Result<usize> {
        self.original_streams.remove_where(&|data| match data.status {
            CalculationStatus::Spent => true,
            CalculationStatus::Archived => delete_archived,
            CalculationStatus::Active => false,
        })
    }

    pub fn delete_metastream_data(&self) -> Result<usize> {
        self.metastreams.remove_where(&|_| true)
    }

    pub fn stats(&self) -> Result<String> {
        self.backend.stats()
    }
}

pub(crate) fn chunk_execution_info(data: &OriginalStreamData) -> ChunkExecutionInfo {
    ChunkExecutionInfo {
        is_tombstoned: data.is_tombstoned,
        discard_point: data.discard_point,
        maybe_discard_point: data.maybe_discard_point,
        max_age: data.max_age,
    }
}

pub(crate) fn sum_chunk_weights(
    weights: &dyn ScavengeMap<u32, f32>,
    start_logical_chunk_number: u32,
    end_logical_chunk_number: u32,
) -> Result<f32> {
    let mut total = 0.0;
    for chunk in start_logical_chunk_number..=end_logical_chunk_number {
        total += weights.get(&chunk)?.unwrap_or(0.0);
    }
    Ok(total)
}
