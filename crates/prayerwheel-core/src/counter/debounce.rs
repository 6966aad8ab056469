//! Write batching for durable saves.

use chrono::{DateTime, Duration, FixedOffset};

/// Decides when batched in-memory changes should be written out.
///
/// The first check of a session is always due; afterwards a save is due
/// once `interval` has passed since the last attempt, or as soon as the
/// clock is observed moving backwards.
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    interval: Duration,
    last_attempt: Option<DateTime<FixedOffset>>,
}

impl SaveDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: DateTime<FixedOffset>) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now < last || now - last >= self.interval,
        }
    }

    /// Record a save attempt, successful or not.
    pub fn mark(&mut self, now: DateTime<FixedOffset>) {
        self.last_attempt = Some(now);
    }
}
