//! Narrow views of the database that the scavenging phases depend on.
//!
//! The chunk file format, the physical index and the scavenge points stream
//! live outside this crate; each phase consumes only the trait it needs.

mod accumulator_reader;
mod calculator_index;
mod chunk_executor_io;
mod chunk_merger_io;
mod index_scavenger;
mod naming;
mod scavenge_point_source;
mod scavenger_log;

pub use accumulator_reader::*;
pub use calculator_index::*;
pub use chunk_executor_io::*;
pub use chunk_merger_io::*;
pub use index_scavenger::*;
pub use naming::*;
pub use scavenge_point_source::*;
pub use scavenger_log::*;
