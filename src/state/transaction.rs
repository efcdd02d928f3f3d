use tracing::error;
use tracing::trace;

use super::ScavengeState;
use crate::Result;
use crate::ScavengeCheckpoint;

/// An open scavenge state transaction.
///
/// Finish it with [`ScavengeTransaction::commit`], which persists the
/// checkpoint together with the transaction's writes, or with
/// [`ScavengeTransaction::rollback`]. Dropping an unfinished transaction
/// rolls it back.
#[must_use = "dropping the transaction rolls it back"]
pub struct ScavengeTransaction<'a> {
    state: &'a ScavengeState,
    finished: bool,
}

impl<'a> ScavengeTransaction<'a> {
    pub(super) fn new(state: &'a ScavengeState) -> Self {
        Self {
            state,
            finished: false,
        }
    }

    pub fn commit(
        mut self,
        checkpoint: ScavengeCheckpoint,
    ) -> Result<()> {
        self.finished = true;
        trace!("commit scavenge state transaction at {}", checkpoint);
        self.state.commit_with_checkpoint(checkpoint)
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.state.rollback_transaction()
    }
}

impl Drop for ScavengeTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            trace!("unfinished scavenge state transaction dropped; rolling back");
            if let Err(e) = self.state.rollback_transaction() {
                error!("failed to roll back scavenge state transaction: {:?}", e);
            }
        }
    }
}
