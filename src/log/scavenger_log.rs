use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use tracing::info;
use tracing::warn;

use crate::metrics::CHUNKS_MERGED_METRIC;
use crate::metrics::CHUNKS_SCAVENGED_METRIC;
use crate::metrics::INDEX_ENTRIES_METRIC;
use crate::metrics::SCAVENGE_RESULT_METRIC;
use crate::metrics::SPACE_SAVED_METRIC;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScavengeResult {
    Success,
    /// Cancelled; the next scavenge resumes from the checkpoint
    Stopped,
    Errored,
}

impl fmt::Display for ScavengeResult {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ScavengeResult::Success => write!(f, "Success"),
            ScavengeResult::Stopped => write!(f, "Stopped"),
            ScavengeResult::Errored => write!(f, "Errored"),
        }
    }
}

/// Operator-facing progress of one scavenge run.
#[cfg_attr(test, automock)]
pub trait ScavengerLog: Send + Sync + 'static {
    fn scavenge_id(&self) -> String;

    /// Total bytes reclaimed so far
    fn space_saved(&self) -> i64;

    fn scavenge_started(
        &self,
        threads: usize,
        merge_chunks: bool,
    );

    fn chunks_scavenged(
        &self,
        chunk_start_number: u32,
        chunk_end_number: u32,
        elapsed: Duration,
        space_saved: i64,
    );

    fn chunks_not_scavenged(
        &self,
        chunk_start_number: u32,
        chunk_end_number: u32,
        elapsed: Duration,
        error_message: &str,
    );

    fn chunks_merged(
        &self,
        chunk_start_number: u32,
        chunk_end_number: u32,
        elapsed: Duration,
        space_saved: i64,
    );

    fn chunks_not_merged(
        &self,
        chunk_start_number: u32,
        chunk_end_number: u32,
        elapsed: Duration,
        error_message: &str,
    );

    fn index_table_scavenged(
        &self,
        level: u32,
        index: u32,
        elapsed: Duration,
        entries_deleted: u64,
        entries_kept: u64,
        space_saved: i64,
    );

    fn index_table_not_scavenged(
        &self,
        level: u32,
        index: u32,
        elapsed: Duration,
        entries_kept: u64,
        error_message: &str,
    );

    /// Failures here are reported by the caller but never change the result.
    fn scavenge_completed(
        &self,
        result: ScavengeResult,
        error: Option<String>,
        elapsed: Duration,
    ) -> Result<()>;
}

/// Writes scavenge progress through `tracing` and the scavenge metrics.
#[derive(Debug)]
pub struct TracingScavengerLog {
    scavenge_id: String,
    space_saved: AtomicI64,
}

impl Default for TracingScavengerLog {
    fn default() -> Self {
        Self::new(nanoid::nanoid!())
    }
}

impl TracingScavengerLog {
    pub fn new(scavenge_id: String) -> Self {
        crate::metrics::register_scavenge_metrics();
        Self {
            scavenge_id,
            space_saved: AtomicI64::new(0),
        }
    }

    fn add_space_saved(
        &self,
        saved: i64,
    ) {
        self.space_saved.fetch_add(saved, Ordering::Relaxed);
        if saved > 0 {
            SPACE_SAVED_METRIC.inc_by(saved as u64);
        }
    }
}

impl ScavengerLog for TracingScavengerLog {
    fn scavenge_id(&self) -> String {
        self.scavenge_id.clone()
    }

    fn space_saved(&self) -> i64 {
        self.space_saved.load(Ordering::Relaxed)
    }

    fn scavenge_started(
        &self,
        threads: usize,
        merge_chunks: bool,
    ) {
        info!(
            "SCAVENGING: scavenge {} started. threads: {}, merge chunks: {}",
            self.scavenge_id, threads, merge_chunks
        );
    }

    fn chunks_scavenged(
        &self,
        chunk_start_number: u32,
        chunk_end_number: u32,
        elapsed: Duration,
        space_saved: i64,
    ) {
        self.add_space_saved(space_saved);
        CHUNKS_SCAVENGED_METRIC.with_label_values(&["scavenged"]).inc();
        info!(
            "SCAVENGING: chunks {}-{} scavenged in {:?}, saved {} bytes",
            chunk_start_number, chunk_end_number, elapsed, space_saved
        );
    }

    fn chunks_not_scavenged(
        &self,
        chunk_start_number: u32,
        chunk_end_number: u32,
        elapsed: Duration,
        error_message: &str,
    ) {
        CHUNKS_SCAVENGED_METRIC.with_label_values(&["not_scavenged"]).inc();
        warn!(
            "SCAVENGING: chunks {}-{} not scavenged after {:?}: {}",
            chunk_start_number, chunk_end_number, elapsed, error_message
        );
    }

    fn chunks_merged(
        &self,
        chunk_start_number: u32,
        chunk_end_number: u32,
        elapsed: Duration,
        space_saved: i64,
    ) {
        self.add_space_saved(space_saved);
        CHUNKS_MERGED_METRIC.with_label_values(&["merged"]).inc();
        info!(
            "SCAVENGING: chunks {}-{} merged in {:?}, saved {} bytes",
            chunk_start_number, chunk_end_number, elapsed, space_saved
        );
    }

    fn chunks_not_merged(
        &self,
        chunk_start_number: u32,
        chunk_end_number: u32,
        elapsed: Duration,
        error_message: &str,
    ) {
        CHUNKS_MERGED_METRIC.with_label_values(&["not_merged"]).inc();
        warn!(
            "SCAVENGING: chunks {}-{} not merged after {:?}: {}",
            chunk_start_number, chunk_end_number, elapsed, error_message
        );
    }

    fn index_table_scavenged(
        &self,
        level: u32,
        index: u32,
        elapsed: Duration,
        entries_deleted: u64,
        entries_kept: u64,
        space_saved: i64,
    ) {
        self.add_space_saved(space_saved);
        INDEX_ENTRIES_METRIC
            .with_label_values(&["deleted"])
            .inc_by(entries_deleted);
        INDEX_ENTRIES_METRIC.with_label_values(&["kept"]).inc_by(entries_kept);
        info!(
            "SCAVENGING: index table {}/{} scavenged in {:?}: {} entries deleted, {} kept",
            level, index, elapsed, entries_deleted, entries_kept
        );
    }

    fn index_table_not_scavenged(
        &self,
        level: u32,
        index: u32,
        elapsed: Duration,
        entries_kept: u64,
        error_message: &str,
    ) {
        INDEX_ENTRIES_METRIC.with_label_values(&["kept"]).inc_by(entries_kept);
        warn!(
            "SCAVENGING: index table {}/{} not scavenged after {:?}: {}",
            level, index, elapsed, error_message
        );
    }

    fn scavenge_completed(
        &self,
        result: ScavengeResult,
        error: Option<String>,
        elapsed: Duration,
    ) -> Result<()> {
        SCAVENGE_RESULT_METRIC
            .with_label_values(&[&result.to_string()])
            .inc();
        match error {
            Some(error) => warn!(
                "SCAVENGING: scavenge {} completed. result: {}, error: {}, elapsed: {:?}, space saved: {}",
                self.scavenge_id,
                result,
                error,
                elapsed,
                self.space_saved()
            ),
            None => info!(
                "SCAVENGING: scavenge {} completed. result: {}, elapsed: {:?}, space saved: {}",
                self.scavenge_id,
                result,
                elapsed,
                self.space_saved()
            ),
        }
        Ok(())
    }
}
