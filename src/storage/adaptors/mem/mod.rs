mod mem_scavenge_map;
mod mem_state_backend;

pub use mem_scavenge_map::*;
pub use mem_state_backend::*;
