use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The first event number of a stream that must be kept.
///
/// Every event with a smaller number may be discarded. Discard points only
/// ever move forward; combine two of them with [`DiscardPoint::or`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiscardPoint(i64);

impl DiscardPoint {
    pub const KEEP_ALL: DiscardPoint = DiscardPoint(0);

    /// Discard every event before `event_number`.
    pub const fn discard_before(event_number: i64) -> Self {
        DiscardPoint(event_number)
    }

    /// Discard every event up to and including `event_number`.
    pub const fn discard_including(event_number: i64) -> Self {
        DiscardPoint(event_number.saturating_add(1))
    }

    pub const fn first_event_number_to_keep(&self) -> i64 {
        self.0
    }

    pub const fn should_discard(
        &self,
        event_number: i64,
    ) -> bool {
        event_number < self.0
    }

    /// The more restrictive of the two points.
    pub fn or(
        self,
        other: DiscardPoint,
    ) -> DiscardPoint {
        self.max(other)
    }

    pub fn is_keep_all(&self) -> bool {
        *self == Self::KEEP_ALL
    }
}

impl fmt::Display for DiscardPoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.is_keep_all() {
            write!(f, "Keep all")
        } else {
            write!(f, "Discard before {}", self.0)
        }
    }
}
