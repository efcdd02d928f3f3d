use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::StateBackendConfig;
use crate::Error;
use crate::Result;

/// Tuning and behaviour of a scavenge run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScavengeConfig {
    /// Size in bytes of one logical chunk of the log
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Number of chunks rewritten concurrently by the chunk executor.
    /// Values above the supported maximum are clamped with a warning.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Records processed between cancellation checks (and throttle rests)
    #[serde(default = "default_cancellation_check_period")]
    pub cancellation_check_period: usize,

    /// Streams whose discard points are calculated per transaction
    #[serde(default = "default_calculator_batch_size")]
    pub calculator_batch_size: usize,

    /// Threshold stored on scavenge points created by this node.
    /// Chunks are rewritten when their weight exceeds it; negative values rewrite every chunk.
    #[serde(default)]
    pub threshold_for_new_scavenge: i32,

    /// Only scavenge up to an existing scavenge point, never create one
    #[serde(default)]
    pub sync_only: bool,

    /// Remove tombstoned streams entirely, tombstones included.
    /// A removed tombstone lets the stream be written again.
    #[serde(default)]
    pub unsafe_ignore_hard_deletes: bool,

    #[serde(default = "default_merge_chunks")]
    pub merge_chunks: bool,

    /// Percentage of wall time the scavenge may spend working (1..=100)
    #[serde(default = "default_throttle_percent")]
    pub throttle_percent: u8,

    /// Also drop state rows of streams that have no limits
    #[serde(default)]
    pub clean_archived_streams: bool,

    /// Weight added to a chunk per event that is certainly discarded
    #[serde(default = "default_discard_weight")]
    pub discard_weight: f32,

    /// Weight added to a chunk per event that may be discarded
    #[serde(default = "default_maybe_discard_weight")]
    pub maybe_discard_weight: f32,

    #[serde(default)]
    pub state: StateBackendConfig,
}

impl Default for ScavengeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            threads: default_threads(),
            cancellation_check_period: default_cancellation_check_period(),
            calculator_batch_size: default_calculator_batch_size(),
            threshold_for_new_scavenge: 0,
            sync_only: false,
            unsafe_ignore_hard_deletes: false,
            merge_chunks: default_merge_chunks(),
            throttle_percent: default_throttle_percent(),
            clean_archived_streams: false,
            discard_weight: default_discard_weight(),
            maybe_discard_weight: default_maybe_discard_weight(),
            state: StateBackendConfig::default(),
        }
    }
}

impl ScavengeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "chunk_size must be greater than 0".into(),
            )));
        }

        if self.threads == 0 {
            return Err(Error::Config(ConfigError::Message(
                "threads must be at least 1".into(),
            )));
        }

        if self.cancellation_check_period == 0 {
            return Err(Error::Config(ConfigError::Message(
                "cancellation_check_period must be greater than 0".into(),
            )));
        }

        if self.calculator_batch_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "calculator_batch_size must be greater than 0".into(),
            )));
        }

        if self.throttle_percent == 0 || self.throttle_percent > 100 {
            return Err(Error::Config(ConfigError::Message(format!(
                "throttle_percent must be between 1 and 100, got {}",
                self.throttle_percent
            ))));
        }

        if self.throttle_percent != 100 && self.threads > 1 {
            return Err(Error::Config(ConfigError::Message(
                "throttle_percent must be 100 for a multi-threaded scavenge".into(),
            )));
        }

        if !(self.discard_weight > 0.0) || !(self.maybe_discard_weight > 0.0) {
            return Err(Error::Config(ConfigError::Message(
                "discard weights must be positive".into(),
            )));
        }

        self.state.validate()?;

        Ok(())
    }
}

fn default_chunk_size() -> u64 {
    256 * 1024 * 1024 //256MB
}
fn default_threads() -> usize {
    1
}
fn default_cancellation_check_period() -> usize {
    1024
}
fn default_calculator_batch_size() -> usize {
    8192
}
fn default_merge_chunks() -> bool {
    true
}
fn default_throttle_percent() -> u8 {
    100
}
fn default_discard_weight() -> f32 {
    2.0
}
fn default_maybe_discard_weight() -> f32 {
    1.0
}
