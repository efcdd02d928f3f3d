//! # scavenge-engine
//!
//! A checkpointed log compaction ("scavenging") engine for append-only event
//! stores.
//!
//! A scavenge works towards a scavenge point, a marker record in the log. It
//! reads the log written since the previous scavenge point, works out which
//! events the stream metadata (max count, max age, truncate before) and
//! tombstones allow it to discard, rewrites the chunks and index without
//! them, and finally merges small chunks. Progress is checkpointed in the
//! scavenge state so that an interrupted scavenge resumes where it stopped.
//!
//! ## Phases
//! 1. [`Accumulator`]: records metadata, tombstones, hash collisions and chunk timestamp ranges
//! 2. [`Calculator`]: turns stream limits into discard points and chunk weights
//! 3. [`ChunkExecutor`]: rewrites chunks whose weight exceeds the threshold
//! 4. [`IndexExecutor`]: drops index entries of discarded events
//! 5. [`ChunkMerger`]: merges adjacent small chunks
//! 6. [`Cleaner`]: forgets state that later scavenges no longer need
//!
//! Build a [`Scavenger`] with the [`ScavengerBuilder`].

mod builder;
mod config;
mod constants;
mod core;
mod errors;
mod log;
mod metrics;
mod model;
mod state;
mod storage;
pub mod utils;

pub use builder::*;
pub use config::*;
pub use constants::*;
pub use core::*;
pub use errors::*;
pub use log::*;
pub use metrics::*;
pub use model::*;
pub use state::*;
pub use storage::*;
pub use utils::*;

#[cfg(test)]
mod builder_test;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
