//! The scavenging pipeline: one stage per phase plus the [`Scavenger`] that
//! drives them from the persisted checkpoint.

mod accumulator;
mod calculator;
mod chunk_executor;
mod chunk_merger;
mod cleaner;
mod index_executor;
mod scavenger;
mod weights;

pub use accumulator::*;
pub use calculator::*;
pub use chunk_executor::*;
pub use chunk_merger::*;
pub use cleaner::*;
pub use index_executor::*;
pub use scavenger::*;
pub use weights::WeightPolicy;
pub(crate) use weights::*;

#[cfg(test)]
mod weights_test;
