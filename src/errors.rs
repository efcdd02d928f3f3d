//! Scavenging Error Hierarchy
//!
//! Defines the error types raised while compacting the log, categorized by
//! infrastructure layer and by the kind of data defect that was detected.

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (storage, chunk IO, serialization)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Scavenge configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Inconsistent data detected while scavenging
    #[error(transparent)]
    Scavenge(#[from] ScavengeError),

    /// Cooperative cancellation observed by a phase
    #[error("Scavenge was cancelled")]
    Cancelled,

    /// Unrecoverable failures requiring operator intervention
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Cancellation unwinds through `Result` but is not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Scavenge state storage
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    // Chunk readers and writers
    #[error("Chunk operation failed: {0}")]
    Chunk(#[from] ChunkError),

    //Serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Serialization failures for persisted data
    #[error(transparent)]
    BincodeError(#[from] bincode::Error),

    /// Embedded database errors
    #[error("Embedded database error: {0}")]
    DbError(String),

    /// Error type for key conversion operations
    #[error("Key convert failed: {0}")]
    Convert(#[from] ConvertError),

    /// Unreadable bytes found under a known key
    #[error("Data corruption detected at {location}")]
    DataCorruption { location: String },
}

/// Error type for key conversion operations
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Invalid input length error
    ///
    /// This occurs when the input byte slice length doesn't match the integer width.
    #[error("invalid byte length: expected {expected} bytes, received {actual} bytes")]
    InvalidLength { expected: usize, actual: usize },

    /// Generic conversion failure with detailed message
    #[error("conversion failure: {0}")]
    ConversionFailure(String),
}

// Serialization is classified separately from storage (stream metadata, checkpoints)
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Bincode serialization failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The chunk is being deleted underneath the executor
    #[error("Chunk file {0} is being deleted")]
    FileBeingDeleted(String),

    /// The chunk file could not be read
    #[error("Failed to read chunk {name}: {reason}")]
    ReadFailed { name: String, reason: String },

    /// The replacement chunk could not be written or swapped in
    #[error("Failed to write chunk {name}: {reason}")]
    WriteFailed { name: String, reason: String },

    /// No physical chunk covers the requested position
    #[error("No chunk found for position {0}")]
    NotFound(u64),
}

/// Data defects. None of these are expected in a healthy database; the run is
/// aborted and the checkpoint left in place for a later retry.
#[derive(Debug, thiserror::Error)]
pub enum ScavengeError {
    /// A hash was expected to belong to exactly one stream
    #[error("Hash {hash} is used by more than one stream")]
    HashCollision { hash: u64 },

    /// A hash was expected to have a recorded user
    #[error("No stream is recorded for hash {hash}")]
    UnknownHash { hash: u64 },

    #[error("A scavenge state transaction is already open")]
    TransactionAlreadyOpen,

    #[error("No scavenge state transaction is open")]
    NoOpenTransaction,

    /// Every chunk before the scavenge point must be completed
    #[error("Found open chunk {chunk} before scavenge point {scavenge_point}")]
    OpenChunkBeforeScavengePoint { chunk: String, scavenge_point: String },

    /// The log was read past the scavenge point without finding it
    #[error("Scavenge point {scavenge_point} at position {position} was not found; read up to {reached}")]
    ScavengePointNotReached {
        scavenge_point: String,
        position: u64,
        reached: u64,
    },

    /// The calculator never found an event to keep
    #[error("Discard point calculation for {stream} would discard every event")]
    AllEventsDiscarded { stream: String },

    /// A record shape that cannot occur in a consistent log
    #[error("Unexpected record in stream {stream} at event {event_number}: {reason}")]
    UnexpectedRecord {
        stream: String,
        event_number: i64,
        reason: String,
    },
}

// ============== Conversion Implementations ============== //
impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<ConvertError> for Error {
    fn from(e: ConvertError) -> Self {
        Error::System(SystemError::Storage(StorageError::Convert(e)))
    }
}

impl From<ChunkError> for Error {
    fn from(e: ChunkError) -> Self {
        Error::System(SystemError::Chunk(e))
    }
}

impl From<SerializationError> for Error {
    fn from(e: SerializationError) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::System(SystemError::Storage(StorageError::DbError(e.to_string())))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::System(SystemError::Storage(StorageError::BincodeError(e)))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Storage(StorageError::IoError(e)))
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Error::System(SystemError::TaskFailed(e))
    }
}
