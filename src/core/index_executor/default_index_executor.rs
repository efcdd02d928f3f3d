use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::IndexExecutor;
use crate::IndexEntry;
use crate::IndexExecutorStreamLookup;
use crate::IndexScavenger;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengePoint;
use crate::ScavengeState;
use crate::ScavengerLog;
use crate::StreamHandle;

pub struct DefaultIndexExecutor {
    unsafe_ignore_hard_deletes: bool,
    index_scavenger: Arc<dyn IndexScavenger>,
    stream_lookup: Arc<dyn IndexExecutorStreamLookup>,
    log: Arc<dyn ScavengerLog>,
}

#[async_trait]
impl IndexExecutor for DefaultIndexExecutor {
    async fn execute(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("SCAVENGING: started new index execution for {}", scavenge_point.name());
        state.set_checkpoint(ScavengeCheckpoint::ExecutingIndex {
            scavenge_point: scavenge_point.clone(),
        })?;
        self.resume(scavenge_point, state, cancel).await
    }

    /// Index tables are rewritten whole, so there is nothing partial to skip.
    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("SCAVENGING: executing index for {}", scavenge_point.name());

        let should_keep =
            |entry: &IndexEntry| -> Result<bool> { self.should_keep(entry, scavenge_point, state) };
        self.index_scavenger
            .scavenge_index(scavenge_point.position, &should_keep, self.log.as_ref(), cancel)
            .await
    }
}

impl DefaultIndexExecutor {
    pub fn new(
        unsafe_ignore_hard_deletes: bool,
        index_scavenger: Arc<dyn IndexScavenger>,
        stream_lookup: Arc<dyn IndexExecutorStreamLookup>,
        log: Arc<dyn ScavengerLog>,
    ) -> Self {
        Self {
            unsafe_ignore_hard_deletes,
            index_scavenger,
            stream_lookup,
            log,
        }
    }

    pub(crate) fn should_keep(
        &self,
        entry: &IndexEntry,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
    ) -> Result<bool> {
        if entry.log_position >= scavenge_point.position {
            return Ok(true);
        }

        // a shared hash says nothing about the stream; ask the log
        let handle = if state.is_collision_hash(entry.stream_hash) {
            match self.stream_lookup.try_get_stream_id(entry.log_position)? {
                Some(stream_id) => StreamHandle::Id(stream_id),
                // the record was scavenged from its chunk
                None => return Ok(false),
            }
        } else {
            StreamHandle::Hash(entry.stream_hash)
        };

        let Some(info) = state.try_get_index_execution_info(&handle)? else {
            return Ok(true);
        };

        if info.is_tombstoned && (self.unsafe_ignore_hard_deletes || info.is_metastream) {
            return Ok(false);
        }
        Ok(!info.discard_point.should_discard(entry.event_number))
    }
}
