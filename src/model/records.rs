use chrono::DateTime;
use chrono::Utc;

use super::StreamId;

/// A prepare record as seen by the accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorRecord {
    /// Any record in an original (non-meta) stream
    OriginalStream {
        stream_id: StreamId,
        log_position: u64,
        timestamp: DateTime<Utc>,
    },
    /// Any record in a metastream. The data is the raw metadata body.
    MetadataStream {
        stream_id: StreamId,
        event_number: i64,
        log_position: u64,
        timestamp: DateTime<Utc>,
        data: Vec<u8>,
    },
    /// The hard delete marker of an original stream
    Tombstone {
        stream_id: StreamId,
        event_number: i64,
        log_position: u64,
        timestamp: DateTime<Utc>,
    },
}

impl AccumulatorRecord {
    pub fn log_position(&self) -> u64 {
        match self {
            AccumulatorRecord::OriginalStream { log_position, .. }
            | AccumulatorRecord::MetadataStream { log_position, .. }
            | AccumulatorRecord::Tombstone { log_position, .. } => *log_position,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AccumulatorRecord::OriginalStream { timestamp, .. }
            | AccumulatorRecord::MetadataStream { timestamp, .. }
            | AccumulatorRecord::Tombstone { timestamp, .. } => *timestamp,
        }
    }
}

/// One event of a stream as returned by an index read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventInfo {
    pub log_position: u64,
    pub event_number: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventInfoSlice {
    /// Events in the direction of the read
    pub event_infos: Vec<EventInfo>,
    /// Where the next read in the same direction should start
    pub next_event_number: i64,
    pub is_end_of_stream: bool,
}

/// A log record as seen by the chunk executor.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorRecord {
    /// Commits, system records and anything else that is not an event
    NonPrepare { log_position: u64, data: Vec<u8> },
    Prepare(PrepareRecord),
}

impl ExecutorRecord {
    pub fn log_position(&self) -> u64 {
        match self {
            ExecutorRecord::NonPrepare { log_position, .. } => *log_position,
            ExecutorRecord::Prepare(prepare) => prepare.log_position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareRecord {
    pub stream_id: StreamId,
    /// Negative for prepares written inside an explicit transaction
    pub event_number: i64,
    pub log_position: u64,
    pub timestamp: DateTime<Utc>,
    /// False for prepares that belong to an explicit transaction
    pub is_self_committed: bool,
    pub is_tombstone: bool,
    pub is_transaction_begin: bool,
    pub data: Vec<u8>,
}

/// One entry of the stream index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub stream_hash: u64,
    pub event_number: i64,
    pub log_position: u64,
}
