//! Third phase: rewrites every physical chunk before the scavenge point whose
//! weight crosses the threshold, keeping only the records that survive the
//! discard points.
//!
//! Chunks are processed by a bounded pool of tokio tasks. Each task reads the
//! state through its own [`ChunkWorkerState`](crate::ChunkWorkerState); only
//! the coordinating task writes to the scavenge state.

mod chunk_worker;
mod default_chunk_executor;
pub(crate) use chunk_worker::*;
pub use default_chunk_executor::*;

#[cfg(test)]
mod default_chunk_executor_test;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::ScavengePoint;
use crate::ScavengeState;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChunkExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Continues with the physical chunk after `done_logical_chunk_number`.
    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        done_logical_chunk_number: Option<u32>,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
