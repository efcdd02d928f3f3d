//! Second phase: turns the limits gathered by the accumulator into discard
//! points for every original stream that needs them.
//!
//! Each stream is walked through the index from its current discard point.
//! Events that are certainly discardable add `discard_weight` to their chunk,
//! events that may have exceeded their max age add `maybe_discard_weight`.

mod default_calculator;
pub use default_calculator::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::ScavengePoint;
use crate::ScavengeState;
use crate::StreamHandle;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Calculator: Send + Sync + 'static {
    async fn calculate(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Continues with the streams after `done_stream_handle`.
    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        done_stream_handle: Option<StreamHandle>,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
