use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;

use super::Accumulator;
use crate::constants::METADATA_ORDERING_READ_COUNT;
use crate::logical_chunk_number;
use crate::AccumulatorRecord;
use crate::ChunkReaderForAccumulator;
use crate::ChunkTimeStampRange;
use crate::DiscardPoint;
use crate::Error;
use crate::IndexReaderForAccumulator;
use crate::MetastreamLookup;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengeError;
use crate::ScavengePoint;
use crate::ScavengeState;
use crate::StreamMetadata;
use crate::Throttle;
use crate::WeightAccumulator;
use crate::WeightPolicy;

pub struct DefaultAccumulator {
    chunk_size: u64,
    cancellation_check_period: usize,
    weight_policy: WeightPolicy,
    metastream_lookup: Arc<dyn MetastreamLookup>,
    chunk_reader: Arc<dyn ChunkReaderForAccumulator>,
    index_reader: Arc<dyn IndexReaderForAccumulator>,
    throttle: Arc<Throttle>,
}

/// What one logical chunk contributed
#[derive(Debug, Default)]
struct ChunkAccumulation {
    originals: usize,
    metadatas: usize,
    tombstones: usize,
    time_stamps: Option<(DateTime<Utc>, DateTime<Utc>)>,
    reached_scavenge_point: bool,
}

impl ChunkAccumulation {
    fn records(&self) -> usize {
        self.originals + self.metadatas + self.tombstones
    }

    fn observe(
        &mut self,
        timestamp: DateTime<Utc>,
    ) {
        self.time_stamps = Some(match self.time_stamps {
            None => (timestamp, timestamp),
            Some((min, max)) => (min.min(timestamp), max.max(timestamp)),
        });
    }
}

#[async_trait]
impl Accumulator for DefaultAccumulator {
    async fn accumulate(
        &self,
        prev_scavenge_point: Option<ScavengePoint>,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(
            "SCAVENGING: started new accumulation from {} to {}",
            prev_scavenge_point
                .as_ref()
                .map(|sp| sp.name())
                .unwrap_or_else(|| "beginning of log".to_string()),
            scavenge_point.name()
        );

        // a scavenge point always closes its chunk, so that chunk is done
        let done_logical_chunk_number =
            prev_scavenge_point.map(|prev| logical_chunk_number(prev.position, self.chunk_size));

        state.set_checkpoint(ScavengeCheckpoint::Accumulating {
            scavenge_point: scavenge_point.clone(),
            done_logical_chunk_number,
        })?;
        self.resume(scavenge_point, done_logical_chunk_number, state, cancel)
            .await
    }

    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        done_logical_chunk_number: Option<u32>,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(
            "SCAVENGING: accumulating for {} after chunk {:?}",
            scavenge_point.name(),
            done_logical_chunk_number
        );

        let mut logical_chunk_number = done_logical_chunk_number.map_or(0, |done| done + 1);
        while self
            .accumulate_chunk(scavenge_point, logical_chunk_number, state, cancel)
            .await?
        {
            logical_chunk_number += 1;
        }
        Ok(())
    }
}

impl DefaultAccumulator {
    pub fn new(
        chunk_size: u64,
        cancellation_check_period: usize,
        weight_policy: WeightPolicy,
        metastream_lookup: Arc<dyn MetastreamLookup>,
        chunk_reader: Arc<dyn ChunkReaderForAccumulator>,
        index_reader: Arc<dyn IndexReaderForAccumulator>,
        throttle: Arc<Throttle>,
    ) -> Self {
        Self {
            chunk_size,
            cancellation_check_period: cancellation_check_period.max(1),
            weight_policy,
            metastream_lookup,
            chunk_reader,
            index_reader,
            throttle,
        }
    }

    /// Accumulates one logical chunk in its own transaction.
    ///
    /// Returns whether there are more chunks before the scavenge point.
    #[instrument(skip(self, scavenge_point, state, cancel))]
    async fn accumulate_chunk(
        &self,
        scavenge_point: &ScavengePoint,
        logical_chunk_number: u32,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let started = Instant::now();
        let transaction = state.begin_transaction()?;
        let mut weights = WeightAccumulator::new(self.weight_policy);

        let accumulation = match self
            .read_chunk(scavenge_point, logical_chunk_number, state, &mut weights, cancel)
            .await
        {
            Ok(accumulation) => accumulation,
            Err(e) => {
                if !e.is_cancelled() {
                    error!("SCAVENGING: rolling back accumulation of chunk {}: {:?}", logical_chunk_number, e);
                }
                transaction.rollback()?;
                return Err(e);
            }
        };

        if let Some((min, max)) = accumulation.time_stamps {
            state.set_chunk_time_stamp_range(logical_chunk_number, ChunkTimeStampRange::new(min, max))?;
        }
        weights.flush(state)?;
        transaction.commit(ScavengeCheckpoint::Accumulating {
            scavenge_point: scavenge_point.clone(),
            done_logical_chunk_number: Some(logical_chunk_number),
        })?;

        debug!(
            "SCAVENGING: accumulated {} records ({} originals, {} metadatas, {} tombstones) in chunk {} in {:?}",
            accumulation.records(),
            accumulation.originals,
            accumulation.metadatas,
            accumulation.tombstones,
            logical_chunk_number,
            started.elapsed()
        );

        Ok(!accumulation.reached_scavenge_point)
    }

    async fn read_chunk(
        &self,
        scavenge_point: &ScavengePoint,
        logical_chunk_number: u32,
        state: &ScavengeState,
        weights: &mut WeightAccumulator,
        cancel: &CancellationToken,
    ) -> Result<ChunkAccumulation> {
        let mut accumulation = ChunkAccumulation::default();

        // the chunk holding the scavenge point was already committed
        if u64::from(logical_chunk_number) * self.chunk_size > scavenge_point.position {
            accumulation.reached_scavenge_point = true;
            return Ok(accumulation);
        }

        let mut records = self.chunk_reader.read_chunk_into(logical_chunk_number);
        let mut checks = 0;
        while let Some(record) = records.next().await {
            let record = record?;
            match &record {
                AccumulatorRecord::OriginalStream { stream_id, .. } => {
                    state.detect_collisions(stream_id)?;
                    accumulation.originals += 1;
                }
                AccumulatorRecord::MetadataStream {
                    stream_id,
                    event_number,
                    log_position,
                    data,
                    ..
                } => {
                    self.process_metadata(
                        stream_id,
                        *event_number,
                        *log_position,
                        data,
                        scavenge_point,
                        state,
                        weights,
                    )
                    .await?;
                    accumulation.metadatas += 1;
                }
                AccumulatorRecord::Tombstone {
                    stream_id,
                    event_number,
                    ..
                } => {
                    self.process_tombstone(stream_id, *event_number, scavenge_point, state, weights)
                        .await?;
                    accumulation.tombstones += 1;
                }
            }
            accumulation.observe(record.timestamp());

            let log_position = record.log_position();
            if log_position == scavenge_point.position {
                accumulation.reached_scavenge_point = true;
                return Ok(accumulation);
            }
            if log_position > scavenge_point.position {
                return Err(ScavengeError::ScavengePointNotReached {
                    scavenge_point: scavenge_point.name(),
                    position: scavenge_point.position,
                    reached: log_position,
                }
                .into());
            }

            checks += 1;
            if checks == self.cancellation_check_period {
                checks = 0;
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                self.throttle.rest(cancel).await?;
            }
        }

        Ok(accumulation)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_metadata(
        &self,
        metastream_id: &str,
        event_number: i64,
        log_position: u64,
        data: &[u8],
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        weights: &mut WeightAccumulator,
    ) -> Result<()> {
        let original_stream_id = self.metastream_lookup.original_stream_of(metastream_id);
        state.detect_collisions(&original_stream_id)?;
        state.detect_collisions(metastream_id)?;

        if event_number < 0 {
            return Err(ScavengeError::UnexpectedRecord {
                stream: metastream_id.to_string(),
                event_number,
                reason: "metadata written in an explicit transaction".into(),
            }
            .into());
        }

        let (is_in_order, replaced_position) = self
            .check_metadata_ordering(metastream_id, event_number, log_position, scavenge_point, state)
            .await?;

        if let Some(replaced) = replaced_position {
            weights.on_discard(logical_chunk_number(replaced, self.chunk_size));
        }

        if !is_in_order {
            info!(
                "SCAVENGING: accumulator found out of order metadata: {}:{}",
                metastream_id, event_number
            );
            return Ok(());
        }

        // metadata of a metastream ($$$$x) does not change the limits of $$x
        if !self.metastream_lookup.is_metastream(&original_stream_id) {
            state.set_original_stream_metadata(&original_stream_id, &StreamMetadata::from_json(data))?;
        }

        let discard_point = DiscardPoint::discard_before(event_number);
        if !discard_point.is_keep_all() {
            state.set_metastream_discard_point(metastream_id, discard_point)?;
        }
        Ok(())
    }

    /// Decides whether a metadata record takes effect, and which earlier
    /// record it replaces.
    ///
    /// A record is out of order when an event with the same or a later number
    /// sits earlier in the log; it is then skipped and its own chunk gains
    /// weight. An in-order record replaces the event just before it.
    async fn check_metadata_ordering(
        &self,
        metastream_id: &str,
        event_number: i64,
        log_position: u64,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
    ) -> Result<(bool, Option<u64>)> {
        let from_event_number = if event_number == 0 { 0 } else { event_number - 1 };
        let slice = self
            .index_reader
            .read_event_info_forward(
                &state.get_stream_handle(metastream_id),
                from_event_number,
                METADATA_ORDERING_READ_COUNT,
                scavenge_point,
            )
            .await?;

        let is_in_order = !slice
            .event_infos
            .iter()
            .any(|info| info.log_position < log_position && info.event_number >= event_number);

        if !is_in_order {
            return Ok((false, Some(log_position)));
        }

        let replaced = slice
            .event_infos
            .first()
            .filter(|first| first.event_number < event_number && first.log_position < log_position)
            .map(|first| first.log_position);
        Ok((true, replaced))
    }

    async fn process_tombstone(
        &self,
        original_stream_id: &str,
        event_number: i64,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        weights: &mut WeightAccumulator,
    ) -> Result<()> {
        state.detect_collisions(original_stream_id)?;

        if self.metastream_lookup.is_metastream(original_stream_id) {
            return Err(ScavengeError::UnexpectedRecord {
                stream: original_stream_id.to_string(),
                event_number,
                reason: "tombstone in a metadata stream".into(),
            }
            .into());
        }
        if event_number < 0 {
            return Err(ScavengeError::UnexpectedRecord {
                stream: original_stream_id.to_string(),
                event_number,
                reason: "tombstone written in an explicit transaction".into(),
            }
            .into());
        }

        state.set_original_stream_tombstone(original_stream_id)?;

        let metastream_id = self.metastream_lookup.metastream_of(original_stream_id);
        state.detect_collisions(&metastream_id)?;
        state.set_metastream_tombstone(&metastream_id)?;

        // a tombstone applies even when out of order. no metadata follows it,
        // so the last metadata record is the one that becomes discardable.
        let last_metadata = self
            .index_reader
            .read_event_info_backward(
                &metastream_id,
                &state.get_stream_handle(&metastream_id),
                1,
                scavenge_point,
            )
            .await?;
        for info in last_metadata.event_infos {
            weights.on_discard(logical_chunk_number(info.log_position, self.chunk_size));
        }
        Ok(())
    }
}
