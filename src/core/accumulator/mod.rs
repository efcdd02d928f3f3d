//! First phase: a single forward pass over the log written since the previous
//! scavenge point.
//!
//! Every stream touched is checked for hash collisions. Metadata records set
//! the limits of their original stream and move the discard point of their
//! metastream; tombstones mark both streams. The timestamp range of each
//! logical chunk is recorded for the calculator's max-age checks.

mod default_accumulator;
pub use default_accumulator::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::ScavengePoint;
use crate::ScavengeState;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Accumulator: Send + Sync + 'static {
    /// Starts accumulating towards `scavenge_point`, from just after
    /// `prev_scavenge_point` or from the beginning of the log.
    async fn accumulate(
        &self,
        prev_scavenge_point: Option<ScavengePoint>,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Continues after the last logical chunk committed by a previous run.
    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        done_logical_chunk_number: Option<u32>,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
