use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use super::Cleaner;
use crate::Error;
use crate::Result;
use crate::ScavengeCheckpoint;
use crate::ScavengePoint;
use crate::ScavengeState;

/// Metastream rows are only needed until every chunk has been executed; so
/// are the rows of tombstoned streams.
pub struct DefaultCleaner {
    clean_archived_streams: bool,
}

#[async_trait]
impl Cleaner for DefaultCleaner {
    async fn clean(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("SCAVENGING: started new cleaning for {}", scavenge_point.name());
        state.set_checkpoint(ScavengeCheckpoint::Cleaning {
            scavenge_point: scavenge_point.clone(),
        })?;
        self.resume(scavenge_point, state, cancel).await
    }

    async fn resume(
        &self,
        scavenge_point: &ScavengePoint,
        state: &ScavengeState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // a chunk below the threshold may still hold records these rows discard
        if !state.all_chunks_executed()? {
            info!("SCAVENGING: skipping cleaning, not every chunk with weight has been executed");
            return Ok(());
        }

        let transaction = state.begin_transaction()?;
        let metastreams = state.delete_metastream_data()?;
        let originals = state.delete_original_stream_data(self.clean_archived_streams)?;
        transaction.commit(ScavengeCheckpoint::Cleaning {
            scavenge_point: scavenge_point.clone(),
        })?;

        debug!(
            "SCAVENGING: cleaned {} metastream rows and {} original stream rows",
            metastreams, originals
        );
        Ok(())
    }
}

impl DefaultCleaner {
    pub fn new(clean_archived_streams: bool) -> Self {
        Self {
            clean_archived_streams,
        }
    }
}
