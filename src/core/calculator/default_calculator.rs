use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;

use super::Calculator;
use crate::constants::CALCULATOR_READ_SLICE_SIZE;
use crate::logical_chunk_number;
use crate::CalculationStatus;
use crate::DiscardPoint;
use crate::Error;
use crate::EventInfo;
use crate::IndexReaderForCalculator;
use crate::OriginalStreamData;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengeError;
use crate::ScavengePoint;
use crate::ScavengeState;
use crate::StreamHandle;
use crate::Throttle;
use crate::WeightAccumulator;
use crate::WeightPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DiscardDecision {
    Discard,
    MaybeDiscard,
    /// The event's chunk has already been scavenged away
    AlreadyDiscarded,
    Keep,
}

/// Streams and events handled since the last cancellation check
#[derive(Debug, Default)]
struct WorkCounter(usize);

pub struct DefaultCalculator {
    chunk_size: u64,
    batch_size: usize,
    cancellation_check_period: usize,
    weight_policy: WeightPolicy,
    index_reader: Arc<dyn IndexReaderForCalculator>,
    throttle: Arc<Throttle>,
}

#[async_trait]
impl Calculator for DefaultCalculator {
    async fn calculate(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("SCAVENGING: started new calculation for {}", scavenge_point.name());
        state.set_checkpoint(ScavengeCheckpoint::Calculating {
            scavenge_point: scavenge_point.clone(),
            done_stream_handle: None,
        })?;
        self.resume(scavenge_point, None, state, cancel).await
    }

    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        done_stream_handle: Option<StreamHandle>,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(
            "SCAVENGING: calculating for {} after {:?}",
            scavenge_point.name(),
            done_stream_handle
        );

        let mut after = done_stream_handle;
        loop {
            let batch = state.original_streams_to_calculate(after.as_ref(), self.batch_size)?;
            let Some((last_handle, _)) = batch.last() else {
                break;
            };
            let last_handle = last_handle.clone();

            self.calculate_batch(scavenge_point, batch, &last_handle, state, cancel)
                .await?;
            after = Some(last_handle);

            self.throttle.rest(cancel).await?;
        }
        Ok(())
    }
}

impl DefaultCalculator {
    pub fn new(
        chunk_size: u64,
        batch_size: usize,
        cancellation_check_period: usize,
        weight_policy: WeightPolicy,
        index_reader: Arc<dyn IndexReaderForCalculator>,
        throttle: Arc<Throttle>,
    ) -> Self {
        Self {
            chunk_size,
            batch_size: batch_size.max(1),
            cancellation_check_period: cancellation_check_period.max(1),
            weight_policy,
            index_reader,
            throttle,
        }
    }

    async fn calculate_batch(
        &self,
        scavenge_point: &ScavengePoint,
        batch: Vec<(StreamHandle, OriginalStreamData)>,
        last_handle: &StreamHandle,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        let streams = batch.len();
        let transaction = state.begin_transaction()?;
        let mut weights = WeightAccumulator::new(self.weight_policy);
        let mut work = WorkCounter::default();

        for (handle, data) in batch {
            let calculated = async {
                self.calculate_stream(&handle, data, scavenge_point, state, &mut weights, &mut work, cancel)
                    .await?;
                self.tick(&mut work, cancel).await
            }
            .await;
            if let Err(e) = calculated {
                if !e.is_cancelled() {
                    error!("SCAVENGING: failed to calculate discard points for {}: {:?}", handle, e);
                }
                transaction.rollback()?;
                return Err(e);
            }
        }

        weights.flush(state)?;
        transaction.commit(ScavengeCheckpoint::Calculating {
            scavenge_point: scavenge_point.clone(),
            done_stream_handle: Some(last_handle.clone()),
        })?;
        debug!(
            "SCAVENGING: calculated {} streams up to {} in {:?}",
            streams,
            last_handle,
            started.elapsed()
        );
        Ok(())
    }

    /// Counts one stream or event. Every `cancellation_check_period` of them
    /// the token is checked and the throttle gets to rest.
    async fn tick(
        &self,
        work: &mut WorkCounter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        work.0 += 1;
        if work.0 < self.cancellation_check_period {
            return Ok(());
        }
        work.0 = 0;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.throttle.rest(cancel).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn calculate_stream(
        &self,
        handle: &StreamHandle,
        data: OriginalStreamData,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        weights: &mut WeightAccumulator,
        work: &mut WorkCounter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let status = if data.is_tombstoned {
            CalculationStatus::Spent
        } else if !data.metadata().has_limits() {
            CalculationStatus::Archived
        } else {
            CalculationStatus::Active
        };

        if status == CalculationStatus::Archived {
            trace!("SCAVENGING: {} has no limits, archiving", handle);
            return state.set_original_stream_discard_points(
                handle,
                status,
                data.discard_point,
                data.maybe_discard_point,
            );
        }

        let (discard_point, maybe_discard_point) = self
            .calculate_discard_points(handle, &data, scavenge_point, state, weights, work, cancel)
            .await?;

        // never move backwards
        let discard_point = discard_point.or(data.discard_point);
        let maybe_discard_point = maybe_discard_point
            .or(data.maybe_discard_point)
            .or(discard_point);

        if status != data.status
            || discard_point != data.discard_point
            || maybe_discard_point != data.maybe_discard_point
        {
            trace!(
                "SCAVENGING: {}: {} / maybe {}",
                handle,
                discard_point,
                maybe_discard_point
            );
            state.set_original_stream_discard_points(handle, status, discard_point, maybe_discard_point)?;
        }
        Ok(())
    }

    /// Walks the stream forward from its current discard point, stopping at
    /// the first event that must be kept.
    #[allow(clippy::too_many_arguments)]
    async fn calculate_discard_points(
        &self,
        handle: &StreamHandle,
        data: &OriginalStreamData,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        weights: &mut WeightAccumulator,
        work: &mut WorkCounter,
        cancel: &CancellationToken,
    ) -> Result<(DiscardPoint, DiscardPoint)> {
        let Some(last_event_number) = self
            .index_reader
            .get_last_event_number(handle, scavenge_point)
            .await?
        else {
            return Ok((DiscardPoint::KEEP_ALL, DiscardPoint::KEEP_ALL));
        };

        let truncation = truncation_discard_point(data, last_event_number);
        let cutoff = data.max_age.map(|max_age| scavenge_point.max_age_cutoff(max_age));

        let mut discard_point = DiscardPoint::KEEP_ALL;
        let mut maybe_discard_point = DiscardPoint::KEEP_ALL;
        let mut seen_any = false;
        let mut all_discarded = true;
        let mut from_event_number = data.discard_point.first_event_number_to_keep();

        loop {
            let slice = self
                .index_reader
                .read_event_info_forward(handle, from_event_number, CALCULATOR_READ_SLICE_SIZE, scavenge_point)
                .await?;

            for info in &slice.event_infos {
                self.tick(work, cancel).await?;
                if !seen_any {
                    seen_any = true;
                    discard_point = DiscardPoint::discard_before(info.event_number);
                    maybe_discard_point = discard_point;
                }

                let chunk = logical_chunk_number(info.log_position, self.chunk_size);
                match self.decide_event(info, last_event_number, truncation, cutoff, state)? {
                    DiscardDecision::Discard => {
                        weights.on_discard(chunk);
                        discard_point = DiscardPoint::discard_including(info.event_number);
                        all_discarded = true;
                    }
                    DiscardDecision::MaybeDiscard => {
                        weights.on_maybe_discard(chunk);
                        maybe_discard_point = DiscardPoint::discard_including(info.event_number);
                        all_discarded = false;
                    }
                    DiscardDecision::AlreadyDiscarded => {
                        if all_discarded {
                            discard_point = DiscardPoint::discard_including(info.event_number);
                        }
                    }
                    DiscardDecision::Keep => {
                        return Ok((discard_point, maybe_discard_point.or(discard_point)));
                    }
                }
            }

            if slice.is_end_of_stream {
                break;
            }
            from_event_number = slice.next_event_number;
        }

        if !seen_any {
            return Ok((DiscardPoint::KEEP_ALL, DiscardPoint::KEEP_ALL));
        }
        Err(ScavengeError::AllEventsDiscarded {
            stream: handle.to_string(),
        }
        .into())
    }

    fn decide_event(
        &self,
        info: &EventInfo,
        last_event_number: i64,
        truncation: DiscardPoint,
        cutoff: Option<DateTime<Utc>>,
        state: &ScavengeState,
    ) -> Result<DiscardDecision> {
        if truncation.should_discard(info.event_number) {
            return Ok(DiscardDecision::Discard);
        }
        let Some(cutoff) = cutoff else {
            return Ok(DiscardDecision::Keep);
        };
        if info.event_number == last_event_number {
            return Ok(DiscardDecision::Keep);
        }

        let chunk = logical_chunk_number(info.log_position, self.chunk_size);
        Ok(match state.try_get_chunk_time_stamp_range(chunk)? {
            None => DiscardDecision::AlreadyDiscarded,
            Some(range) if range.max < cutoff => DiscardDecision::Discard,
            Some(range) if range.min >= cutoff => DiscardDecision::Keep,
            Some(_) => DiscardDecision::MaybeDiscard,
        })
    }
}

/// Combined discard point of `$tb`, `$maxCount` and a tombstone. The last
/// event is always kept.
pub(crate) fn truncation_discard_point(
    data: &OriginalStreamData,
    last_event_number: i64,
) -> DiscardPoint {
    let mut discard_point = DiscardPoint::KEEP_ALL;
    if let Some(truncate_before) = data.truncate_before {
        discard_point = discard_point.or(DiscardPoint::discard_before(truncate_before));
    }
    if let Some(max_count) = data.max_count {
        discard_point =
            discard_point.or(DiscardPoint::discard_before(last_event_number - max_count + 1));
    }
    if data.is_tombstoned {
        discard_point = discard_point.or(DiscardPoint::discard_before(last_event_number));
    }
    discard_point.min(DiscardPoint::discard_before(last_event_number))
}
