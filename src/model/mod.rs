//! Values shared by every scavenging phase and persisted in the scavenge state.

mod checkpoint;
mod discard_point;
mod records;
mod scavenge_point;
mod stream;

pub use checkpoint::*;
pub use discard_point::*;
pub use records::*;
pub use scavenge_point::*;
pub use stream::*;


/// Stream names are plain UTF-8 strings.
pub type StreamId = String;
