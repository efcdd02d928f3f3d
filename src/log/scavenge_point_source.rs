use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::ScavengePoint;

/// Optimistic concurrency check for writing a new scavenge point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No scavenge point has been written yet
    NoStream,
    /// The last scavenge point has this event number
    Exact(i64),
}

/// The scavenge points stream.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScavengePointSource: Send + Sync + 'static {
    async fn get_latest_scavenge_point(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<ScavengePoint>>;

    /// Writes a scavenge point. Writing it closes the current chunk so that
    /// everything before it can be scavenged.
    async fn add_scavenge_point(
        &self,
        expected_version: ExpectedVersion,
        threshold: i32,
        cancel: &CancellationToken,
    ) -> Result<ScavengePoint>;
}
