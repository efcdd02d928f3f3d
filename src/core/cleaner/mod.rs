//! Last phase: forgets state that no later scavenge can need.

mod default_cleaner;
pub use default_cleaner::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::ScavengePoint;
use crate::ScavengeState;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Cleaner: Send + Sync + 'static {
    async fn clean(
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
