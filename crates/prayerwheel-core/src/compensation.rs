//! Offline rotation compensation.
//!
//! When the app suspends, the current time, speed and devotion type are
//! snapshotted. On resume the wheel is credited with the whole rotations it
//! would have completed in the meantime, capped to a fixed window of
//! wall-clock time.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::devotion::DevotionType;
use crate::rotation::rotations_completed;
use crate::storage::SnapshotPersistence;

/// State captured at suspend time. At most one is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendSnapshot {
    pub closed_at: DateTime<FixedOffset>,
    pub speed_at_close: f64,
    pub devotion_at_close: DevotionType,
}

/// Outcome of reconciling a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    pub devotion: DevotionType,
    /// Rotations credited, after the cap.
    pub rotations: u64,
    /// Wall-clock time since the snapshot; zero if the clock went backwards.
    #[serde(with = "duration_secs")]
    pub offline: Duration,
    /// True when the cap reduced the count.
    pub capped: bool,
}

pub struct OfflineCompensator<S> {
    persistence: S,
    max_offline: Duration,
    clear_after_reconcile: bool,
}

impl<S: SnapshotPersistence> OfflineCompensator<S> {
    pub fn new(persistence: S, max_offline: Duration) -> Self {
        Self {
            persistence,
            max_offline,
            clear_after_reconcile: true,
        }
    }

    /// Keep the snapshot after reconciling instead of clearing it.
    /// A second reconcile then recounts from the same close time.
    pub fn retain_snapshot_after_reconcile(mut self, retain: bool) -> Self {
        self.clear_after_reconcile = !retain;
        self
    }

    /// Persist a snapshot, replacing any earlier one.
    pub fn snapshot(&mut self, speed_rpm: f64, devotion: DevotionType, now: DateTime<FixedOffset>) {
        let snapshot = SuspendSnapshot {
            closed_at: now,
            speed_at_close: speed_rpm,
            devotion_at_close: devotion,
        };
        match self.persistence.save_snapshot(&snapshot) {
            Ok(()) => tracing::debug!(devotion = devotion.key(), speed_rpm, %now, "suspend snapshot saved"),
            Err(e) => tracing::warn!(error = %e, "failed to save suspend snapshot"),
        }
    }

    pub fn has_snapshot(&self) -> bool {
        matches!(self.persistence.load_snapshot(), Ok(Some(_)))
    }

    /// Compute what a reconcile at `now` would credit, without applying it.
    pub fn preview(&self, now: DateTime<FixedOffset>) -> Option<Compensation> {
        let snapshot = match self.persistence.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load suspend snapshot");
                return None;
            }
        };
        self.compute(&snapshot, now)
    }

    /// Number of rotations a reconcile at `now` would credit.
    pub fn missed_rotations(&self, now: DateTime<FixedOffset>) -> u64 {
        self.preview(now).map_or(0, |c| c.rotations)
    }

    /// Credit missed rotations one at a time through `credit`, then clear the
    /// snapshot. Returns `None` when there was no usable snapshot.
    pub fn reconcile<F>(&mut self, now: DateTime<FixedOffset>, mut credit: F) -> Option<Compensation>
    where
        F: FnMut(DevotionType),
    {
        let snapshot = match self.persistence.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!("no suspend snapshot; skipping compensation");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load suspend snapshot");
                return None;
            }
        };

        let compensation = self.apply(&snapshot, now, &mut credit);
        if self.clear_after_reconcile {
            self.discard();
        }
        compensation
    }

    /// Credit an offline gap that was never snapshotted, such as a wheel left
    /// spinning by a process that exited. The same cap applies and nothing is
    /// persisted.
    pub fn compensate_gap<F>(
        &self,
        speed_rpm: f64,
        devotion: DevotionType,
        since: DateTime<FixedOffset>,
        now: DateTime<FixedOffset>,
        mut credit: F,
    ) -> Option<Compensation>
    where
        F: FnMut(DevotionType),
    {
        let snapshot = SuspendSnapshot {
            closed_at: since,
            speed_at_close: speed_rpm,
            devotion_at_close: devotion,
        };
        self.apply(&snapshot, now, &mut credit)
    }

    /// Drop the pending snapshot without crediting anything.
    pub fn discard(&mut self) {
        if let Err(e) = self.persistence.clear_snapshot() {
            tracing::warn!(error = %e, "failed to clear suspend snapshot");
        }
    }

    fn apply<F>(&self, snapshot: &SuspendSnapshot, now: DateTime<FixedOffset>, credit: &mut F) -> Option<Compensation>
    where
        F: FnMut(DevotionType),
    {
        let compensation = self.compute(snapshot, now)?;
        for _ in 0..compensation.rotations {
            credit(compensation.devotion);
        }
        tracing::info!(
            devotion = compensation.devotion.key(),
            rotations = compensation.rotations,
            offline_secs = compensation.offline.num_seconds(),
            capped = compensation.capped,
            "offline compensation applied"
        );
        Some(compensation)
    }

    fn compute(&self, snapshot: &SuspendSnapshot, now: DateTime<FixedOffset>) -> Option<Compensation> {
        let speed = snapshot.speed_at_close;
        if !(speed > 0.0 && speed.is_finite()) {
            return None;
        }
        let offline = now.signed_duration_since(snapshot.closed_at).max(Duration::zero());
        let elapsed_secs = offline.num_milliseconds() as f64 / 1000.0;
        let raw = rotations_completed(elapsed_secs, speed);
        let cap = rotations_completed(self.max_offline.num_seconds() as f64, speed);
        Some(Compensation {
            devotion: snapshot.devotion_at_close,
            rotations: raw.min(cap),
            offline,
            capped: raw > cap,
        })
    }
}

mod duration_secs {
    use chrono::Duration;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        Duration::try_seconds(secs).ok_or_else(|| de::Error::custom(format!("duration out of range: {secs}s")))
    }
}
