use std::time::Duration;

use super::*;
use crate::ScavengeResult;
use crate::ScavengerLog;
use crate::TracingScavengerLog;

#[test]
fn test_registry_exposes_scavenge_metrics() {
    register_scavenge_metrics();
    // registering twice must not fail
    register_scavenge_metrics();

    SCAVENGE_RESULT_METRIC.with_label_values(&["Success"]).inc();
    PHASE_DURATION_METRIC
        .with_label_values(&["calculation"])
        .observe(3.0);

    let metric_names: Vec<_> = REGISTRY
        .gather()
        .iter()
        .map(|m| m.get_name().to_string())
        .collect();
    assert!(metric_names.contains(&"scavenge_results".to_string()));
    assert!(metric_names.contains(&"scavenge_phase_duration_ms".to_string()));
}

#[test]
fn test_histogram_labels() {
    PHASE_DURATION_METRIC
        .with_label_values(&["test_phase_a"])
        .observe(100.0);
    PHASE_DURATION_METRIC
        .with_label_values(&["test_phase_b"])
        .observe(200.0);
    PHASE_DURATION_METRIC
        .with_label_values(&["test_phase_b"])
        .observe(50.0);

    assert_eq!(
        PHASE_DURATION_METRIC
            .with_label_values(&["test_phase_a"])
            .get_sample_count(),
        1
    );
    assert_eq!(
        PHASE_DURATION_METRIC
            .with_label_values(&["test_phase_b"])
            .get_sample_count(),
        2
    );
}

#[test]
fn test_scavenger_log_feeds_counters() {
    let log = TracingScavengerLog::new("metrics-test".to_string());
    let saved_before = SPACE_SAVED_METRIC.get();
    let stopped_before = SCAVENGE_RESULT_METRIC.with_label_values(&["Stopped"]).get();

    log.chunks_scavenged(0, 0, Duration::from_millis(5), 400);
    log.scavenge_completed(ScavengeResult::Stopped, None, Duration::from_secs(1))
        .unwrap();

    // other tests update the same counters concurrently
    assert!(SPACE_SAVED_METRIC.get() >= saved_before + 400);
    assert!(SCAVENGE_RESULT_METRIC.with_label_values(&["Stopped"]).get() > stopped_before);
    assert_eq!(log.space_saved(), 400);
}

#[test]
fn test_gather_metrics_text_format() {
    CHUNKS_MERGED_METRIC.with_label_values(&["merged"]).inc();

    let body = gather_metrics();

    assert!(body.contains("# TYPE scavenge_chunk_merges counter"));
    assert!(body.contains("scavenge_chunk_merges{outcome=\"merged\"}"));
}
