//! Fourth phase: drops index entries whose events are discarded.

mod default_index_executor;
pub use default_index_executor::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::ScavengePoint;
use crate::ScavengeState;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait IndexExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
