use std::fmt;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// An immutable marker in the log. Everything strictly before `position` is
/// considered by a scavenge; nothing at or after it is ever touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScavengePoint {
    /// Log position of the scavenge point record itself
    pub position: u64,
    /// Event number of the record in the scavenge points stream
    pub event_number: i64,
    /// The "now" against which max-age limits are evaluated
    pub effective_now: DateTime<Utc>,
    /// Minimum chunk weight that makes a chunk worth rewriting
    pub threshold: i32,
}

impl ScavengePoint {
    pub fn new(
        position: u64,
        event_number: i64,
        effective_now: DateTime<Utc>,
        threshold: i32,
    ) -> Self {
        Self {
            position,
            event_number,
            effective_now,
            threshold,
        }
    }

    pub fn name(&self) -> String {
        format!("SP-{}", self.event_number)
    }

    /// Events older than the returned instant have exceeded `max_age`.
    pub fn max_age_cutoff(
        &self,
        max_age: Duration,
    ) -> DateTime<Utc> {
        match chrono::Duration::from_std(max_age) {
            Ok(age) => self
                .effective_now
                .checked_sub_signed(age)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            Err(_) => DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl fmt::Display for ScavengePoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{} (position {}, effective now {}, threshold {})",
            self.name(),
            self.position,
            self.effective_now,
            self.threshold
        )
    }
}
