//! Persistence of the scavenge state.
//!
//! Every piece of state is a [`ScavengeMap`]; a [`ScavengeStateBackend`]
//! groups the maps and owns the transaction that spans them.

mod adaptors;
mod scavenge_map;
mod state_backend;

pub use adaptors::*;
pub use scavenge_map::*;
pub use state_backend::*;
