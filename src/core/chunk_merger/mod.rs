//! Fifth phase: merges runs of small, already scavenged physical chunks into
//! single physical chunks of at most one chunk size of data.

mod default_chunk_merger;
pub use default_chunk_merger::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::ScavengePoint;
use crate::ScavengeState;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChunkMerger: Send + Sync + 'static {
    async fn merge(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Merging is idempotent; resuming walks the chunks again.
    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
