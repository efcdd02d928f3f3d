// -
// Database namespaces

/// Sled tree holding every scavenge state map
pub(crate) const SCAVENGE_STATE_TREE: &str = "_scavenge_state";

/// Sled key prefixes, one per logical map inside the state tree
pub(crate) const HASH_USERS_PREFIX: u8 = 0x01;
pub(crate) const COLLISIONS_PREFIX: u8 = 0x02;
pub(crate) const METASTREAMS_BY_HASH_PREFIX: u8 = 0x03;
pub(crate) const METASTREAMS_BY_ID_PREFIX: u8 = 0x04;
pub(crate) const ORIGINAL_STREAMS_BY_HASH_PREFIX: u8 = 0x05;
pub(crate) const ORIGINAL_STREAMS_BY_ID_PREFIX: u8 = 0x06;
pub(crate) const CHUNK_TIME_STAMP_RANGES_PREFIX: u8 = 0x07;
pub(crate) const CHUNK_WEIGHTS_PREFIX: u8 = 0x08;
pub(crate) const CHECKPOINT_PREFIX: u8 = 0x09;

// -
// Stream naming

/// Metastreams are named after their original stream with this prefix
pub const METASTREAM_PREFIX: &str = "$$";

/// Event number recorded for a stream tombstone
pub const TOMBSTONE_EVENT_NUMBER: i64 = i64::MAX;

/// Stream the scavenge points are written to
pub const SCAVENGE_POINTS_STREAM: &str = "$scavengePoints";

// -
// Tuning

/// Number of index entries read per slice by the calculator
pub(crate) const CALCULATOR_READ_SLICE_SIZE: usize = 8192;

/// Number of index entries scanned when checking metadata ordering
pub(crate) const METADATA_ORDERING_READ_COUNT: usize = 100;

/// Upper bound on concurrent chunk executor workers
pub const MAX_EXECUTOR_THREADS: usize = 4;
