use crate::convert::str_to_u64;
use crate::METASTREAM_PREFIX;

/// Maps between original streams and their metastreams.
pub trait MetastreamLookup: Send + Sync + 'static {
    fn is_metastream(
        &self,
        stream_id: &str,
    ) -> bool;

    fn metastream_of(
        &self,
        original_stream_id: &str,
    ) -> String;

    fn original_stream_of(
        &self,
        metastream_id: &str,
    ) -> String;
}

/// `$$name` is the metastream of `name`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamNaming;

impl MetastreamLookup for StreamNaming {
    fn is_metastream(
        &self,
        stream_id: &str,
    ) -> bool {
        stream_id.starts_with(METASTREAM_PREFIX)
    }

    fn metastream_of(
        &self,
        original_stream_id: &str,
    ) -> String {
        format!("{METASTREAM_PREFIX}{original_stream_id}")
    }

    fn original_stream_of(
        &self,
        metastream_id: &str,
    ) -> String {
        metastream_id
            .strip_prefix(METASTREAM_PREFIX)
            .unwrap_or(metastream_id)
            .to_string()
    }
}

/// 64-bit stream name hash, as used by the stream index.
///
/// Hashes are persisted in the scavenge state, so an implementation must be
/// stable across restarts and rebuilds of the same database. Supply the
/// index's own hasher when the index hashes stream names differently.
pub trait LongHasher: Send + Sync + 'static {
    fn hash(
        &self,
        stream_id: &str,
    ) -> u64;
}

/// Hashes stream names with BLAKE3, see [`str_to_u64`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStreamHasher;

impl LongHasher for DefaultStreamHasher {
    fn hash(
        &self,
        stream_id: &str,
    ) -> u64 {
        str_to_u64(stream_id)
    }
}
