use std::sync::Arc;

use super::*;
use crate::test_utils::HumanReadableHasher;
use crate::MemoryScavengeStateBackend;
use crate::ScavengeState;
use crate::StreamNaming;

#[test]
fn test_weights_are_added_on_flush_only() {
    let state = ScavengeState::new(
        Arc::new(MemoryScavengeStateBackend::new()),
        Arc::new(HumanReadableHasher),
        Arc::new(StreamNaming),
    )
    .unwrap();
    let mut weights = WeightAccumulator::new(WeightPolicy::default());

    weights.on_discard(1);
    weights.on_discard(1);
    weights.on_maybe_discard(2);
    assert_eq!(state.sum_chunk_weights(0, 5).unwrap(), 0.0);

    weights.flush(&state).unwrap();
    assert_eq!(state.sum_chunk_weights(1, 1).unwrap(), 4.0);
    assert_eq!(state.sum_chunk_weights(2, 2).unwrap(), 1.0);

    // flushing again adds nothing
    weights.flush(&state).unwrap();
    assert_eq!(state.sum_chunk_weights(0, 5).unwrap(), 5.0);
}

#[test]
fn test_logical_chunk_number() {
    assert_eq!(logical_chunk_number(0, 100), 0);
    assert_eq!(logical_chunk_number(99, 100), 0);
    assert_eq!(logical_chunk_number(100, 100), 1);
    assert_eq!(logical_chunk_number(u64::MAX, 1), u32::MAX);
}
