use std::sync::Arc;

use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::InMemoryLog;
use crate::Accumulator;
use crate::Calculator;
use crate::DefaultAccumulator;
use crate::DefaultCalculator;
use crate::LongHasher;
use crate::MemoryScavengeStateBackend;
use crate::ScavengeConfig;
use crate::ScavengePoint;
use crate::ScavengeState;
use crate::ScavengerBuilder;
use crate::StreamMetadata;
use crate::StreamNaming;
use crate::Throttle;
use crate::WeightPolicy;

/// Hashes a stream to its first character, plus 256 for metastreams, so
/// tests can pick colliding names by eye: `a-1` and `a-2` collide, `$$a-1`
/// collides with `$$a-2` but not with `a-1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HumanReadableHasher;

impl LongHasher for HumanReadableHasher {
    fn hash(
        &self,
        stream_id: &str,
    ) -> u64 {
        let (offset, name) = match stream_id.strip_prefix("$$") {
            Some(original) => (256, original),
            None => (0, stream_id),
        };
        offset + name.bytes().next().map_or(0, u64::from)
    }
}

/// Fixed "now" used by test scavenge points and as the in-memory log's clock origin
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn scavenge_point(
    position: u64,
    event_number: i64,
) -> ScavengePoint {
    ScavengePoint::new(position, event_number, test_epoch(), 0)
}

pub fn memory_state() -> ScavengeState {
    ScavengeState::new(
        Arc::new(MemoryScavengeStateBackend::new()),
        Arc::new(HumanReadableHasher),
        Arc::new(StreamNaming),
    )
    .unwrap()
}

/// Runs the accumulator and calculator up to `scavenge_point`, leaving the
/// state ready for the execution phases.
pub async fn accumulate_and_calculate(
    log: &InMemoryLog,
    state: &ScavengeState,
    scavenge_point: &ScavengePoint,
) {
    let throttle = Arc::new(Throttle::new(100));
    let cancel = CancellationToken::new();
    DefaultAccumulator::new(
        log.chunk_size(),
        1024,
        WeightPolicy::default(),
        Arc::new(StreamNaming),
        Arc::new(log.clone()),
        Arc::new(log.clone()),
        throttle.clone(),
    )
    .accumulate(None, scavenge_point, state, &cancel)
    .await
    .unwrap();
    DefaultCalculator::new(
        log.chunk_size(),
        8192,
        1024,
        WeightPolicy::default(),
        Arc::new(log.clone()),
        throttle,
    )
    .calculate(scavenge_point, state, &cancel)
    .await
    .unwrap();
}

pub fn max_count(count: i64) -> StreamMetadata {
    StreamMetadata {
        max_count: Some(count),
        ..Default::default()
    }
}

/// A builder with every database view served by `log` and the log's hasher
pub fn scavenger_builder(
    log: &InMemoryLog,
    config: ScavengeConfig,
) -> ScavengerBuilder {
    let log = Arc::new(log.clone());
    ScavengerBuilder::new(config)
        .hasher(log.hasher())
        .chunk_reader(log.clone())
        .accumulator_index(log.clone())
        .calculator_index(log.clone())
        .chunk_manager(log.clone())
        .index_scavenger(log.clone())
        .stream_lookup(log.clone())
        .merger_chunk_manager(log.clone())
        .scavenge_point_source(log)
}

/// Small chunks and frequent cancellation checks
pub fn test_config(chunk_size: u64) -> ScavengeConfig {
    ScavengeConfig {
        chunk_size,
        cancellation_check_period: 1,
        ..Default::default()
    }
}
