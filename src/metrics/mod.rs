use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;

lazy_static! {
    pub static ref CHUNKS_SCAVENGED_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("scavenge_chunks", "Physical chunks handled by the chunk executor"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref CHUNKS_MERGED_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("scavenge_chunk_merges", "Chunk merges attempted by the chunk merger"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref SPACE_SAVED_METRIC: IntCounter = IntCounter::new(
        "scavenge_space_saved_bytes",
        "Bytes reclaimed by chunk execution, merging and index scavenging"
    )
    .expect("metric can not be created");

    pub static ref INDEX_ENTRIES_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("scavenge_index_entries", "Index entries visited by the index executor"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref SCAVENGE_RESULT_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("scavenge_results", "Finished scavenges by result"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref PHASE_DURATION_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new("scavenge_phase_duration_ms", "Duration of each scavenge phase in ms")
            .buckets(exponential_buckets(1.0, 4.0, 12).expect("valid buckets")),
        &["phase"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

/// Registers the scavenge collectors on [`REGISTRY`]. Safe to call repeatedly.
pub fn register_scavenge_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(CHUNKS_SCAVENGED_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(CHUNKS_MERGED_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(SPACE_SAVED_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(INDEX_ENTRIES_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(SCAVENGE_RESULT_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(PHASE_DURATION_METRIC.clone()))
            .expect("collector can be registered");
    });
}

/// Text exposition of the scavenge metrics for Prometheus to scrape
pub fn gather_metrics() -> String {
    register_scavenge_metrics();

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("could not encode scavenge metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("scavenge metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

#[cfg(test)]
mod metrics_test;
