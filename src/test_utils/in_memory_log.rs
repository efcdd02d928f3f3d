use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::test_epoch;
use super::HumanReadableHasher;
use crate::AccumulatorRecord;
use crate::ChunkError;
use crate::ChunkManagerForExecutor;
use crate::ChunkManagerForMerger;
use crate::ChunkReaderForAccumulator;
use crate::ChunkReaderForExecutor;
use crate::ChunkWriterForExecutor;
use crate::CompleteResult;
use crate::CompletedChunk;
use crate::Error;
use crate::EventInfo;
use crate::EventInfoSlice;
use crate::ExecutorRecord;
use crate::ExpectedVersion;
use crate::IndexEntry;
use crate::IndexExecutorStreamLookup;
use crate::IndexReaderForAccumulator;
use crate::IndexReaderForCalculator;
use crate::IndexScavenger;
use crate::LongHasher;
use crate::MergedChunk;
use crate::MetastreamLookup;
use crate::PhysicalChunkInfo;
use crate::PrepareRecord;
use crate::Result;
use crate::ScavengePoint;
use crate::ScavengePointSource;
use crate::ScavengerLog;
use crate::StreamHandle;
use crate::StreamMetadata;
use crate::StreamNaming;
use crate::SCAVENGE_POINTS_STREAM;
use crate::TOMBSTONE_EVENT_NUMBER;

/// Every record occupies the same number of bytes of log
pub const RECORD_SIZE: u64 = 100;

const INDEX_ENTRY_SIZE: i64 = 24;

#[derive(Debug, Clone)]
struct PhysicalChunk {
    start: u32,
    end: u32,
    version: u32,
    is_remote: bool,
    records: Vec<ExecutorRecord>,
}

impl PhysicalChunk {
    fn name(&self) -> String {
        format!("chunk-{:06}-{:06}.{:06}", self.start, self.end, self.version)
    }

    fn contains(
        &self,
        logical_chunk_number: u32,
    ) -> bool {
        self.start <= logical_chunk_number && logical_chunk_number <= self.end
    }
}

#[derive(Debug, Clone)]
struct IndexRow {
    stream_id: String,
    event_number: i64,
    log_position: u64,
}

#[derive(Debug)]
struct LogState {
    chunk_size: u64,
    position: u64,
    now: DateTime<Utc>,
    chunks: Vec<PhysicalChunk>,
    index: Vec<IndexRow>,
    next_event_numbers: HashMap<String, i64>,
    scavenge_points: Vec<ScavengePoint>,
    aborted_writers: Vec<(String, bool)>,
    fail_chunk_writes: bool,
    failing_completes: HashSet<u32>,
    complete_delays: HashMap<u32, Duration>,
}

impl LogState {
    fn open_chunk_number(&self) -> u32 {
        (self.position / self.chunk_size) as u32
    }

    fn chunk_for(
        &self,
        logical_chunk_number: u32,
    ) -> Option<&PhysicalChunk> {
        self.chunks.iter().find(|c| c.contains(logical_chunk_number))
    }

    fn next_event_number(
        &mut self,
        stream_id: &str,
    ) -> i64 {
        let next = self.next_event_numbers.entry(stream_id.to_string()).or_insert(0);
        let event_number = *next;
        *next += 1;
        event_number
    }

    fn push(
        &mut self,
        make: impl FnOnce(u64, DateTime<Utc>) -> ExecutorRecord,
    ) -> u64 {
        let position = self.position;
        let logical = (position / self.chunk_size) as u32;
        let record = make(position, self.now);

        if let ExecutorRecord::Prepare(prepare) = &record {
            if prepare.event_number >= 0 {
                self.index.push(IndexRow {
                    stream_id: prepare.stream_id.clone(),
                    event_number: prepare.event_number,
                    log_position: position,
                });
            }
        }

        match self.chunks.last_mut() {
            Some(chunk) if chunk.contains(logical) => chunk.records.push(record),
            _ => self.chunks.push(PhysicalChunk {
                start: logical,
                end: logical,
                version: 0,
                is_remote: false,
                records: vec![record],
            }),
        }
        self.position += RECORD_SIZE;
        position
    }

    fn complete_chunk(&mut self) {
        if self.position % self.chunk_size != 0 {
            self.position = (self.position / self.chunk_size + 1) * self.chunk_size;
        }
    }

    fn prepare(
        stream_id: &str,
        event_number: i64,
        log_position: u64,
        timestamp: DateTime<Utc>,
        data: Vec<u8>,
    ) -> ExecutorRecord {
        ExecutorRecord::Prepare(PrepareRecord {
            stream_id: stream_id.to_string(),
            event_number,
            log_position,
            timestamp,
            is_self_committed: true,
            is_tombstone: false,
            is_transaction_begin: false,
            data,
        })
    }
}

/// A log, index and scavenge point source kept in memory.
///
/// Positions advance by [`RECORD_SIZE`] per record. Writing a scavenge point
/// completes the chunk it lands in, as the real log does.
#[derive(Clone)]
pub struct InMemoryLog {
    state: Arc<Mutex<LogState>>,
    hasher: Arc<dyn LongHasher>,
    naming: StreamNaming,
}

impl InMemoryLog {
    pub fn new(chunk_size: u64) -> Self {
        assert_eq!(chunk_size % RECORD_SIZE, 0, "chunk size must hold whole records");
        Self {
            state: Arc::new(Mutex::new(LogState {
                chunk_size,
                position: 0,
                now: test_epoch(),
                chunks: Vec::new(),
                index: Vec::new(),
                next_event_numbers: HashMap::new(),
                scavenge_points: Vec::new(),
                aborted_writers: Vec::new(),
                fail_chunk_writes: false,
                failing_completes: HashSet::new(),
                complete_delays: HashMap::new(),
            })),
            hasher: Arc::new(HumanReadableHasher),
            naming: StreamNaming,
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.state.lock().chunk_size
    }

    /// Position the next record will be written at
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    pub fn hasher(&self) -> Arc<dyn LongHasher> {
        self.hasher.clone()
    }

    //-----------------------------------------------------------
    // Writing

    pub fn advance_clock(
        &self,
        by: Duration,
    ) {
        let mut state = self.state.lock();
        state.now += chrono::Duration::from_std(by).unwrap();
    }

    /// Appends one event and returns its position.
    pub fn append(
        &self,
        stream_id: &str,
    ) -> u64 {
        self.append_data(stream_id, Vec::new())
    }

    pub fn append_many(
        &self,
        stream_id: &str,
        count: usize,
    ) -> Vec<u64> {
        (0..count).map(|_| self.append(stream_id)).collect()
    }

    pub fn append_data(
        &self,
        stream_id: &str,
        data: Vec<u8>,
    ) -> u64 {
        let mut state = self.state.lock();
        let event_number = state.next_event_number(stream_id);
        state.push(|position, now| LogState::prepare(stream_id, event_number, position, now, data))
    }

    pub fn write_metadata(
        &self,
        original_stream_id: &str,
        metadata: &StreamMetadata,
    ) -> u64 {
        self.append_data(&self.naming.metastream_of(original_stream_id), metadata.to_json())
    }

    pub fn write_tombstone(
        &self,
        stream_id: &str,
    ) -> u64 {
        let mut state = self.state.lock();
        state.push(|position, now| {
            ExecutorRecord::Prepare(PrepareRecord {
                stream_id: stream_id.to_string(),
                event_number: TOMBSTONE_EVENT_NUMBER,
                log_position: position,
                timestamp: now,
                is_self_committed: true,
                is_tombstone: true,
                is_transaction_begin: false,
                data: Vec::new(),
            })
        })
    }

    /// Writes an explicit transaction: a begin, `events` data prepares and a commit.
    pub fn write_transaction(
        &self,
        stream_id: &str,
        events: usize,
    ) -> Vec<u64> {
        let mut state = self.state.lock();
        let mut positions = Vec::new();
        for i in 0..=events {
            positions.push(state.push(|position, now| {
                ExecutorRecord::Prepare(PrepareRecord {
                    stream_id: stream_id.to_string(),
                    event_number: -1,
                    log_position: position,
                    timestamp: now,
                    is_self_committed: false,
                    is_tombstone: false,
                    is_transaction_begin: i == 0,
                    data: Vec::new(),
                })
            }));
        }
        positions.push(state.push(|position, _| ExecutorRecord::NonPrepare {
            log_position: position,
            data: b"commit".to_vec(),
        }));
        positions
    }

    pub fn complete_chunk(&self) {
        self.state.lock().complete_chunk();
    }

    /// Writes a scavenge point record and completes its chunk.
    pub fn add_scavenge_point_now(
        &self,
        threshold: i32,
    ) -> ScavengePoint {
        let mut state = self.state.lock();
        let event_number = state.next_event_number(SCAVENGE_POINTS_STREAM);
        let position = state.push(|position, now| {
            LogState::prepare(SCAVENGE_POINTS_STREAM, event_number, position, now, Vec::new())
        });
        state.complete_chunk();
        let scavenge_point = ScavengePoint::new(position, event_number, state.now, threshold);
        state.scavenge_points.push(scavenge_point.clone());
        scavenge_point
    }

    pub fn set_remote(
        &self,
        logical_chunk_number: u32,
    ) {
        let mut state = self.state.lock();
        for chunk in state.chunks.iter_mut().filter(|c| c.contains(logical_chunk_number)) {
            chunk.is_remote = true;
        }
    }

    pub fn fail_chunk_writes(&self) {
        self.state.lock().fail_chunk_writes = true;
    }

    /// Swapping in the replacement of the physical chunk starting at
    /// `logical_chunk_number` fails, leaving the old one in place
    pub fn fail_chunk_complete_for(
        &self,
        logical_chunk_number: u32,
    ) {
        self.state.lock().failing_completes.insert(logical_chunk_number);
    }

    /// Swapping in the replacement of the physical chunk starting at
    /// `logical_chunk_number` waits for `delay` first
    pub fn delay_chunk_complete(
        &self,
        logical_chunk_number: u32,
        delay: Duration,
    ) {
        self.state
            .lock()
            .complete_delays
            .insert(logical_chunk_number, delay);
    }

    //-----------------------------------------------------------
    // Inspection

    /// Event numbers of the stream's records still present in the chunks, in log order
    pub fn event_numbers_in_log(
        &self,
        stream_id: &str,
    ) -> Vec<i64> {
        self.prepares_in_log(stream_id)
            .iter()
            .map(|p| p.event_number)
            .collect()
    }

    pub fn prepares_in_log(
        &self,
        stream_id: &str,
    ) -> Vec<PrepareRecord> {
        let state = self.state.lock();
        state
            .chunks
            .iter()
            .flat_map(|c| c.records.iter())
            .filter_map(|r| match r {
                ExecutorRecord::Prepare(p) if p.stream_id == stream_id => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn non_prepare_count(&self) -> usize {
        let state = self.state.lock();
        state
            .chunks
            .iter()
            .flat_map(|c| c.records.iter())
            .filter(|r| matches!(r, ExecutorRecord::NonPrepare { .. }))
            .count()
    }

    /// Event numbers of the stream's index entries, ascending
    pub fn event_numbers_in_index(
        &self,
        stream_id: &str,
    ) -> Vec<i64> {
        let state = self.state.lock();
        let mut numbers: Vec<i64> = state
            .index
            .iter()
            .filter(|row| row.stream_id == stream_id)
            .map(|row| row.event_number)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    pub fn physical_chunk_count(&self) -> usize {
        self.state.lock().chunks.len()
    }

    pub fn chunk_version(
        &self,
        logical_chunk_number: u32,
    ) -> Option<u32> {
        self.state
            .lock()
            .chunk_for(logical_chunk_number)
            .map(|c| c.version)
    }

    pub fn aborted_writers(&self) -> Vec<(String, bool)> {
        self.state.lock().aborted_writers.clone()
    }

    //-----------------------------------------------------------
    // Index reads

    fn matching_rows(
        &self,
        handle: &StreamHandle,
        scavenge_point: &ScavengePoint,
    ) -> Vec<EventInfo> {
        let state = self.state.lock();
        state
            .index
            .iter()
            .filter(|row| row.log_position < scavenge_point.position)
            .filter(|row| match handle {
                StreamHandle::Hash(hash) => self.hasher.hash(&row.stream_id) == *hash,
                StreamHandle::Id(id) => row.stream_id == *id,
            })
            .map(|row| EventInfo {
                log_position: row.log_position,
                event_number: row.event_number,
            })
            .collect()
    }

    fn read_forward(
        &self,
        handle: &StreamHandle,
        from_event_number: i64,
        max_count: usize,
        scavenge_point: &ScavengePoint,
    ) -> EventInfoSlice {
        let mut infos: Vec<EventInfo> = self
            .matching_rows(handle, scavenge_point)
            .into_iter()
            .filter(|info| info.event_number >= from_event_number)
            .collect();
        infos.sort_by_key(|info| (info.event_number, info.log_position));

        let is_end_of_stream = infos.len() <= max_count;
        infos.truncate(max_count);
        let next_event_number = infos
            .last()
            .map_or(from_event_number, |info| info.event_number.saturating_add(1));
        EventInfoSlice {
            event_infos: infos,
            next_event_number,
            is_end_of_stream,
        }
    }
}

impl ChunkReaderForAccumulator for InMemoryLog {
    fn read_chunk_into(
        &self,
        logical_chunk_number: u32,
    ) -> BoxStream<'_, Result<AccumulatorRecord>> {
        let state = self.state.lock();
        let chunk_size = state.chunk_size;
        let records: Vec<Result<AccumulatorRecord>> = state
            .chunk_for(logical_chunk_number)
            .map(|chunk| chunk.records.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.log_position() / chunk_size == u64::from(logical_chunk_number))
            .filter_map(|r| match r {
                ExecutorRecord::NonPrepare { .. } => None,
                ExecutorRecord::Prepare(p) if p.is_tombstone => Some(AccumulatorRecord::Tombstone {
                    stream_id: p.stream_id,
                    event_number: p.event_number,
                    log_position: p.log_position,
                    timestamp: p.timestamp,
                }),
                ExecutorRecord::Prepare(p) if self.naming.is_metastream(&p.stream_id) => {
                    Some(AccumulatorRecord::MetadataStream {
                        stream_id: p.stream_id,
                        event_number: p.event_number,
                        log_position: p.log_position,
                        timestamp: p.timestamp,
                        data: p.data,
                    })
                }
                ExecutorRecord::Prepare(p) => Some(AccumulatorRecord::OriginalStream {
                    stream_id: p.stream_id,
                    log_position: p.log_position,
                    timestamp: p.timestamp,
                }),
            })
            .map(Ok)
            .collect();
        futures::stream::iter(records).boxed()
    }
}

#[async_trait]
impl IndexReaderForAccumulator for InMemoryLog {
    async fn read_event_info_forward(
        &self,
        handle: &StreamHandle,
        from_event_number: i64,
        max_count: usize,
        scavenge_point: &ScavengePoint,
    ) -> Result<EventInfoSlice> {
        Ok(self.read_forward(handle, from_event_number, max_count, scavenge_point))
    }

    async fn read_event_info_backward(
        &self,
        _stream_id: &str,
        handle: &StreamHandle,
        max_count: usize,
        scavenge_point: &ScavengePoint,
    ) -> Result<EventInfoSlice> {
        let mut infos = self.matching_rows(handle, scavenge_point);
        infos.sort_by_key(|info| std::cmp::Reverse((info.event_number, info.log_position)));

        let is_end_of_stream = infos.len() <= max_count;
        infos.truncate(max_count);
        let next_event_number = infos.last().map_or(-1, |info| info.event_number - 1);
        Ok(EventInfoSlice {
            event_infos: infos,
            next_event_number,
            is_end_of_stream,
        })
    }
}

#[async_trait]
impl IndexReaderForCalculator for InMemoryLog {
    async fn get_last_event_number(
        &self,
        handle: &StreamHandle,
        scavenge_point: &ScavengePoint,
    ) -> Result<Option<i64>> {
        Ok(self
            .matching_rows(handle, scavenge_point)
            .iter()
            .map(|info| info.event_number)
            .max())
    }

    async fn read_event_info_forward(
        &self,
        handle: &StreamHandle,
        from_event_number: i64,
        max_count: usize,
        scavenge_point: &ScavengePoint,
    ) -> Result<EventInfoSlice> {
        Ok(self.read_forward(handle, from_event_number, max_count, scavenge_point))
    }
}

//-----------------------------------------------------------
// Chunk execution

pub struct InMemoryChunkReader {
    chunk: PhysicalChunk,
    chunk_size: u64,
    is_read_only: bool,
}

impl ChunkReaderForExecutor for InMemoryChunkReader {
    fn name(&self) -> String {
        self.chunk.name()
    }

    fn file_size(&self) -> u64 {
        self.chunk.records.len() as u64 * RECORD_SIZE
    }

    fn chunk_start_number(&self) -> u32 {
        self.chunk.start
    }

    fn chunk_end_number(&self) -> u32 {
        self.chunk.end
    }

    fn chunk_start_position(&self) -> u64 {
        u64::from(self.chunk.start) * self.chunk_size
    }

    fn chunk_end_position(&self) -> u64 {
        (u64::from(self.chunk.end) + 1) * self.chunk_size
    }

    fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    fn is_remote(&self) -> bool {
        self.chunk.is_remote
    }

    fn read_records(&self) -> BoxStream<'_, Result<ExecutorRecord>> {
        futures::stream::iter(self.chunk.records.iter().cloned().map(Ok)).boxed()
    }
}

pub struct InMemoryChunkWriter {
    log: Arc<Mutex<LogState>>,
    start: u32,
    end: u32,
    version: u32,
    records: Vec<ExecutorRecord>,
}

#[async_trait]
impl ChunkWriterForExecutor for InMemoryChunkWriter {
    fn local_file_name(&self) -> String {
        format!("chunk-{:06}-{:06}.{:06}.tmp", self.start, self.end, self.version)
    }

    async fn write_record(
        &mut self,
        record: &ExecutorRecord,
    ) -> Result<()> {
        if self.log.lock().fail_chunk_writes {
            return Err(ChunkError::WriteFailed {
                name: self.local_file_name(),
                reason: "disk full".into(),
            }
            .into());
        }
        self.records.push(record.clone());
        Ok(())
    }

    async fn complete(self: Box<Self>) -> CompleteResult {
        let delay = self.log.lock().complete_delays.get(&self.start).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.log.lock();
        let found = state
            .chunks
            .iter()
            .position(|c| c.start == self.start && c.end == self.end);
        let index = match found {
            Some(index) if !state.failing_completes.contains(&self.start) => index,
            _ => {
                drop(state);
                let e = ChunkError::WriteFailed {
                    name: self.local_file_name(),
                    reason: "unable to swap in the new chunk".into(),
                };
                let writer: Box<dyn ChunkWriterForExecutor> = self;
                return Err((writer, e.into()));
            }
        };
        let chunk = &mut state.chunks[index];
        chunk.records = self.records;
        chunk.version = self.version;
        Ok(CompletedChunk {
            file_name: chunk.name(),
            file_size: chunk.records.len() as u64 * RECORD_SIZE,
        })
    }

    fn abort(
        self: Box<Self>,
        delete_immediately: bool,
    ) {
        let name = self.local_file_name();
        self.log.lock().aborted_writers.push((name, delete_immediately));
    }
}

#[async_trait]
impl ChunkManagerForExecutor for InMemoryLog {
    fn get_chunk_reader_for(
        &self,
        position: u64,
    ) -> Result<Arc<dyn ChunkReaderForExecutor>> {
        let state = self.state.lock();
        let logical = (position / state.chunk_size) as u32;
        let chunk = state
            .chunk_for(logical)
            .cloned()
            .ok_or(ChunkError::NotFound(position))?;
        Ok(Arc::new(InMemoryChunkReader {
            is_read_only: chunk.end < state.open_chunk_number(),
            chunk_size: state.chunk_size,
            chunk,
        }))
    }

    async fn create_chunk_writer(
        &self,
        source: &dyn ChunkReaderForExecutor,
    ) -> Result<Box<dyn ChunkWriterForExecutor>> {
        let state = self.state.lock();
        let version = state
            .chunk_for(source.chunk_start_number())
            .map_or(1, |c| c.version + 1);
        Ok(Box::new(InMemoryChunkWriter {
            log: self.state.clone(),
            start: source.chunk_start_number(),
            end: source.chunk_end_number(),
            version,
            records: Vec::new(),
        }))
    }
}

impl IndexExecutorStreamLookup for InMemoryLog {
    fn try_get_stream_id(
        &self,
        log_position: u64,
    ) -> Result<Option<String>> {
        let state = self.state.lock();
        let logical = (log_position / state.chunk_size) as u32;
        Ok(state.chunk_for(logical).and_then(|chunk| {
            chunk.records.iter().find_map(|r| match r {
                ExecutorRecord::Prepare(p) if p.log_position == log_position => Some(p.stream_id.clone()),
                _ => None,
            })
        }))
    }
}

#[async_trait]
impl IndexScavenger for InMemoryLog {
    async fn scavenge_index(
        &self,
        scavenge_point_position: u64,
        should_keep: &(dyn for<'e> Fn(&'e IndexEntry) -> Result<bool> + Send + Sync),
        log: &dyn ScavengerLog,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let started = Instant::now();
        let rows = self.state.lock().index.clone();

        let mut kept = Vec::with_capacity(rows.len());
        let mut deleted = 0u64;
        for row in rows {
            let entry = IndexEntry {
                stream_hash: self.hasher.hash(&row.stream_id),
                event_number: row.event_number,
                log_position: row.log_position,
            };
            if row.log_position >= scavenge_point_position || should_keep(&entry)? {
                kept.push(row);
            } else {
                deleted += 1;
            }
        }

        let kept_count = kept.len() as u64;
        self.state.lock().index = kept;
        log.index_table_scavenged(
            0,
            0,
            started.elapsed(),
            deleted,
            kept_count,
            deleted as i64 * INDEX_ENTRY_SIZE,
        );
        Ok(())
    }
}

#[async_trait]
impl ChunkManagerForMerger for InMemoryLog {
    fn physical_chunks_before(
        &self,
        position: u64,
    ) -> Result<Vec<PhysicalChunkInfo>> {
        let state = self.state.lock();
        let open = state.open_chunk_number();
        Ok(state
            .chunks
            .iter()
            .filter(|c| u64::from(c.start) * state.chunk_size < position && c.end < open)
            .map(|c| PhysicalChunkInfo {
                name: c.name(),
                chunk_start_number: c.start,
                chunk_end_number: c.end,
                data_size: c.records.len() as u64 * RECORD_SIZE,
                is_remote: c.is_remote,
            })
            .collect())
    }

    async fn merge_chunks(
        &self,
        chunks: &[PhysicalChunkInfo],
        cancel: &CancellationToken,
    ) -> Result<MergedChunk> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let (Some(first), Some(last)) = (chunks.first(), chunks.last()) else {
            return Err(Error::Fatal("nothing to merge".into()));
        };

        let mut state = self.state.lock();
        let (start, end) = (first.chunk_start_number, last.chunk_end_number);
        let records: Vec<ExecutorRecord> = state
            .chunks
            .iter()
            .filter(|c| c.start >= start && c.end <= end)
            .flat_map(|c| c.records.clone())
            .collect();
        state.chunks.retain(|c| c.end < start || c.start > end);

        let merged = PhysicalChunk {
            start,
            end,
            version: 1,
            is_remote: false,
            records,
        };
        let result = MergedChunk {
            file_name: merged.name(),
            file_size: merged.records.len() as u64 * RECORD_SIZE,
        };
        state.chunks.push(merged);
        state.chunks.sort_by_key(|c| c.start);
        Ok(result)
    }
}

#[async_trait]
impl ScavengePointSource for InMemoryLog {
    async fn get_latest_scavenge_point(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Option<ScavengePoint>> {
        Ok(self.state.lock().scavenge_points.last().cloned())
    }

    async fn add_scavenge_point(
        &self,
        expected_version: ExpectedVersion,
        threshold: i32,
        _cancel: &CancellationToken,
    ) -> Result<ScavengePoint> {
        let latest = self
            .state
            .lock()
            .scavenge_points
            .last()
            .map(|sp| sp.event_number);
        let matches = match expected_version {
            ExpectedVersion::NoStream => latest.is_none(),
            ExpectedVersion::Exact(version) => latest == Some(version),
        };
        if !matches {
            return Err(Error::Fatal(format!(
                "wrong expected version {:?}, latest is {:?}",
                expected_version, latest
            )));
        }
        Ok(self.add_scavenge_point_now(threshold))
    }
}
