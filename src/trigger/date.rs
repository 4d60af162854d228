//! One-shot date trigger.

use chrono::{DateTime, Utc};

/// Fires once at `at`, provided `at` hasn't already been dispatched (past
/// cursor) or already passed (absent a cursor, `at` must be at or after
/// `now`: a job whose date is exactly `now` still gets its one fire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTrigger {
    pub at: DateTime<Utc>,
}

impl DateTrigger {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    pub fn next_fire(&self, cursor: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match cursor {
            Some(floor) if self.at > floor => Some(self.at),
            Some(_) => None,
            None if self.at >= now => Some(self.at),
            None => None,
        }
    }
}
