//! Shared fixtures for the unit tests: a readable hasher, an in-memory state
//! and an in-memory log implementing every database view the phases use.
mod common;
mod in_memory_log;

pub use common::*;
pub use in_memory_log::*;
