use std::collections::BTreeMap;

use crate::Result;
use crate::ScavengeConfig;
use crate::ScavengeState;

/// Weight added to a logical chunk for each event found to be discardable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightPolicy {
    pub discard_weight: f32,
    pub maybe_discard_weight: f32,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self {
            discard_weight: 2.0,
            maybe_discard_weight: 1.0,
        }
    }
}

impl From<&ScavengeConfig> for WeightPolicy {
    fn from(config: &ScavengeConfig) -> Self {
        Self {
            discard_weight: config.discard_weight,
            maybe_discard_weight: config.maybe_discard_weight,
        }
    }
}

/// Collects chunk weight increases for one unit of work and writes them to the
/// state in a single pass, inside the same transaction as the unit's checkpoint.
#[derive(Debug)]
pub(crate) struct WeightAccumulator {
    policy: WeightPolicy,
    pending: BTreeMap<u32, f32>,
}

impl WeightAccumulator {
    pub(crate) fn new(policy: WeightPolicy) -> Self {
        Self {
            policy,
            pending: BTreeMap::new(),
        }
    }

    pub(crate) fn on_discard(
        &mut self,
        logical_chunk_number: u32,
    ) {
        *self.pending.entry(logical_chunk_number).or_default() += self.policy.discard_weight;
    }

    pub(crate) fn on_maybe_discard(
        &mut self,
        logical_chunk_number: u32,
    ) {
        *self.pending.entry(logical_chunk_number).or_default() += self.policy.maybe_discard_weight;
    }

    pub(crate) fn flush(
        &mut self,
        state: &ScavengeState,
    ) -> Result<()> {
        for (chunk, weight) in std::mem::take(&mut self.pending) {
            state.increase_chunk_weight(chunk, weight)?;
        }
        Ok(())
    }
}

/// Logical chunk holding `log_position`.
pub(crate) fn logical_chunk_number(
    log_position: u64,
    chunk_size: u64,
) -> u32 {
    u32::try_from(log_position / chunk_size).unwrap_or(u32::MAX)
}
