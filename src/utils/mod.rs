pub mod convert;
pub mod throttle;

pub use throttle::*;
