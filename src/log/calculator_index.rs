use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::EventInfoSlice;
use crate::Result;
use crate::ScavengePoint;
use crate::StreamHandle;

/// Index reads used by the calculator. Only entries before the scavenge point
/// are ever returned.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IndexReaderForCalculator: Send + Sync + 'static {
    /// `None` when the stream has no events before the scavenge point
    async fn get_last_event_number(
        &self,
        handle: &StreamHandle,
        scavenge_point: &ScavengePoint,
    ) -> Result<Option<i64>>;

    async fn read_event_info_forward(
        &self,
        handle: &StreamHandle,
        from_event_number: i64,
        max_count: usize,
        scavenge_point: &ScavengePoint,
    ) -> Result<EventInfoSlice>;
}
