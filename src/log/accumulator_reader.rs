use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;

use crate::AccumulatorRecord;
use crate::EventInfoSlice;
use crate::Result;
use crate::ScavengePoint;
use crate::StreamHandle;

/// Reads the prepares of the log one logical chunk at a time.
pub trait ChunkReaderForAccumulator: Send + Sync + 'static {
    /// Prepares of `logical_chunk_number` in log order.
    ///
    /// A chunk that does not exist yet yields nothing. A chunk that was merged
    /// into a larger physical chunk yields only the records of its own range.
    fn read_chunk_into(
        &self,
        logical_chunk_number: u32,
    ) -> BoxStream<'_, Result<AccumulatorRecord>>;
}

/// Index reads used by the accumulator to check metadata ordering and to find
/// the last metadata record of a tombstoned stream.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IndexReaderForAccumulator: Send + Sync + 'static {
    /// Events of `handle` from `from_event_number` upwards, only counting those
    /// before the scavenge point.
    async fn read_event_info_forward(
        &self,
        handle: &StreamHandle,
        from_event_number: i64,
        max_count: usize,
        scavenge_point: &ScavengePoint,
    ) -> Result<EventInfoSlice>;

    /// The last events of `stream_id` before the scavenge point, newest first.
    async fn read_event_info_backward(
        &self,
        stream_id: &str,
        handle: &StreamHandle,
        max_count: usize,
        scavenge_point: &ScavengePoint,
    ) -> Result<EventInfoSlice>;
}
