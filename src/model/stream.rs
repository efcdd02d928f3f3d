use std::fmt;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::DiscardPoint;

/// How scavenge state refers to a stream.
///
/// Streams whose hash is unique are stored by hash; streams involved in a
/// hash collision are stored by their full name. Hash handles order before
/// id handles, which is the order the calculator walks them in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StreamHandle {
    Hash(u64),
    Id(String),
}

impl fmt::Display for StreamHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            StreamHandle::Hash(hash) => write!(f, "Hash: {hash}"),
            StreamHandle::Id(id) => write!(f, "Id: {id}"),
        }
    }
}

/// Retention limits of a stream, as written to its metastream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetadata {
    pub max_age: Option<Duration>,
    pub max_count: Option<i64>,
    pub truncate_before: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawStreamMetadata {
    #[serde(rename = "$maxAge")]
    max_age: Option<i64>,
    #[serde(rename = "$maxCount")]
    max_count: Option<i64>,
    #[serde(rename = "$tb")]
    truncate_before: Option<i64>,
}

impl StreamMetadata {
    /// Parses the JSON body of a metadata event.
    ///
    /// Data that does not parse clears every limit, exactly like writing an
    /// empty metadata event would.
    pub fn from_json(data: &[u8]) -> Self {
        match serde_json::from_slice::<RawStreamMetadata>(data) {
            Ok(raw) => StreamMetadata {
                max_age: raw
                    .max_age
                    .filter(|secs| *secs > 0)
                    .map(|secs| Duration::from_secs(secs as u64)),
                max_count: raw.max_count.filter(|count| *count > 0),
                truncate_before: raw.truncate_before.filter(|tb| *tb >= 0),
            },
            Err(e) => {
                debug!("metadata does not parse, clearing limits: {:?}", e);
                StreamMetadata::default()
            }
        }
    }

    pub fn to_json(&self) -> Vec<u8> {
        let mut object = serde_json::Map::new();
        if let Some(max_age) = self.max_age {
            object.insert("$maxAge".into(), max_age.as_secs().into());
        }
        if let Some(max_count) = self.max_count {
            object.insert("$maxCount".into(), max_count.into());
        }
        if let Some(tb) = self.truncate_before {
            object.insert("$tb".into(), tb.into());
        }
        serde_json::Value::Object(object).to_string().into_bytes()
    }

    pub fn has_limits(&self) -> bool {
        self.max_age.is_some() || self.max_count.is_some() || self.truncate_before.is_some()
    }
}

/// Progress of the discard point calculation for an original stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalculationStatus {
    /// Needs (re)calculation at the next scavenge point
    #[default]
    Active,
    /// No limits; nothing to calculate until metadata arrives
    Archived,
    /// Tombstoned; discard points are final
    Spent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetastreamData {
    pub is_tombstoned: bool,
    pub discard_point: DiscardPoint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalStreamData {
    pub is_tombstoned: bool,
    pub max_age: Option<Duration>,
    pub max_count: Option<i64>,
    pub truncate_before: Option<i64>,
    pub discard_point: DiscardPoint,
    pub maybe_discard_point: DiscardPoint,
    pub status: CalculationStatus,
}

impl OriginalStreamData {
    pub fn metadata(&self) -> StreamMetadata {
        StreamMetadata {
            max_age: self.max_age,
            max_count: self.max_count,
            truncate_before: self.truncate_before,
        }
    }
}

/// What a chunk executor needs to know about one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkExecutionInfo {
    pub is_tombstoned: bool,
    pub discard_point: DiscardPoint,
    pub maybe_discard_point: DiscardPoint,
    pub max_age: Option<Duration>,
}

/// What the index executor needs to know about one stream handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexExecutionInfo {
    pub is_metastream: bool,
    pub is_tombstoned: bool,
    pub discard_point: DiscardPoint,
}

/// Oldest and newest record timestamps of one logical chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkTimeStampRange {
    pub min: DateTime<Utc>,
    pub max: DateTime<Utc>,
}

impl ChunkTimeStampRange {
    pub fn new(
        min: DateTime<Utc>,
        max: DateTime<Utc>,
    ) -> Self {
        Self { min, max }
    }
}
