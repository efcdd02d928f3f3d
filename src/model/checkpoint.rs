use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::ScavengePoint;
use super::StreamHandle;

/// Where a scavenge got to. Written in the same transaction as the work it
/// describes, so a restarted scavenge resumes right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScavengeCheckpoint {
    Accumulating {
        scavenge_point: ScavengePoint,
        done_logical_chunk_number: Option<u32>,
    },
    Calculating {
        scavenge_point: ScavengePoint,
        done_stream_handle: Option<StreamHandle>,
    },
    ExecutingChunks {
        scavenge_point: ScavengePoint,
        done_logical_chunk_number: Option<u32>,
    },
    ExecutingIndex {
        scavenge_point: ScavengePoint,
    },
    MergingChunks {
        scavenge_point: ScavengePoint,
    },
    Cleaning {
        scavenge_point: ScavengePoint,
    },
    Done {
        scavenge_point: ScavengePoint,
    },
}

impl ScavengeCheckpoint {
    pub fn scavenge_point(&self) -> &ScavengePoint {
        match self {
            ScavengeCheckpoint::Accumulating { scavenge_point, .. }
            | ScavengeCheckpoint::Calculating { scavenge_point, .. }
            | ScavengeCheckpoint::ExecutingChunks { scavenge_point, .. }
            | ScavengeCheckpoint::ExecutingIndex { scavenge_point }
            | ScavengeCheckpoint::MergingChunks { scavenge_point }
            | ScavengeCheckpoint::Cleaning { scavenge_point }
            | ScavengeCheckpoint::Done { scavenge_point } => scavenge_point,
        }
    }

    pub fn phase_name(&self) -> &'static str {
        match self {
            ScavengeCheckpoint::Accumulating { .. } => "Accumulating",
            ScavengeCheckpoint::Calculating { .. } => "Calculating",
            ScavengeCheckpoint::ExecutingChunks { .. } => "Executing chunks",
            ScavengeCheckpoint::ExecutingIndex { .. } => "Executing index",
            ScavengeCheckpoint::MergingChunks { .. } => "Merging chunks",
            ScavengeCheckpoint::Cleaning { .. } => "Cleaning",
            ScavengeCheckpoint::Done { .. } => "Done",
        }
    }
}

impl fmt::Display for ScavengeCheckpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let sp = self.scavenge_point().name();
        match self {
            ScavengeCheckpoint::Accumulating {
                done_logical_chunk_number,
                ..
            }
            | ScavengeCheckpoint::ExecutingChunks {
                done_logical_chunk_number,
                ..
            } => match done_logical_chunk_number {
                Some(done) => write!(f, "{} for {sp} done chunk {done}", self.phase_name()),
                None => write!(f, "{} for {sp}", self.phase_name()),
            },
            ScavengeCheckpoint::Calculating {
                done_stream_handle, ..
            } => match done_stream_handle {
                Some(done) => write!(f, "{} for {sp} done {done}", self.phase_name()),
                None => write!(f, "{} for {sp}", self.phase_name()),
            },
            _ => write!(f, "{} for {sp}", self.phase_name()),
        }
    }
}
