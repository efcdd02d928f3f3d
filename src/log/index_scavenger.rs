use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::IndexEntry;
use crate::Result;
use crate::ScavengerLog;
use crate::StreamId;

/// The physical index. Rewrites its tables keeping only the entries before
/// `scavenge_point_position` for which `should_keep` returns true; entries at
/// or after the position are kept without asking.
#[async_trait]
pub trait IndexScavenger: Send + Sync + 'static {
    async fn scavenge_index(
        &self,
        scavenge_point_position: u64,
        should_keep: &(dyn for<'e> Fn(&'e IndexEntry) -> Result<bool> + Send + Sync),
        log: &dyn ScavengerLog,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Resolves which stream a log record belongs to, for hashes shared by
/// several streams.
pub trait IndexExecutorStreamLookup: Send + Sync + 'static {
    /// `None` when no record exists at the position any more
    fn try_get_stream_id(
        &self,
        log_position: u64,
    ) -> Result<Option<StreamId>>;
}
