//! Max-merge of counter snapshots.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::counter::{DailyCounterStore, DevotionCounter};
use crate::devotion::DevotionType;
use crate::storage::CounterPersistence;

/// Merge two counters field by field, keeping the larger value.
///
/// Commutative and idempotent; the result is never below either input.
pub fn merge(local: &DevotionCounter, shared: &DevotionCounter) -> DevotionCounter {
    DevotionCounter {
        today_count: local.today_count.max(shared.today_count),
        total_cycles: local.total_cycles.max(shared.total_cycles),
        last_reset_day: local.last_reset_day.max(shared.last_reset_day),
    }
}

/// What a sync changed for one devotion type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub devotion: DevotionType,
    pub merged: DevotionCounter,
    pub local_updated: bool,
    pub shared_updated: bool,
}

/// Reconciles the local counter store with the companion store.
pub struct SyncMerger;

impl SyncMerger {
    /// Merge each devotion type's counter with the shared store and write the
    /// result back to whichever side disagreed.
    ///
    /// Both sides are first read as of `now`'s calendar day, so a side whose
    /// last reset was on another day contributes a today-count of zero. With
    /// no shared store this is a passthrough.
    pub fn sync<P, S>(
        local: &mut DailyCounterStore<P>,
        shared: Option<&S>,
        devotions: &[DevotionType],
        now: DateTime<FixedOffset>,
    ) -> Vec<SyncReport>
    where
        P: CounterPersistence,
        S: CounterPersistence + ?Sized,
    {
        let Some(shared) = shared else {
            tracing::debug!("companion store not configured; skipping sync");
            return Vec::new();
        };
        let today = now.date_naive();
        let mut reports = Vec::new();

        for &devotion in devotions {
            let stored = match shared.load_counter(devotion) {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!(devotion = devotion.key(), error = %e, "companion store unreadable; keeping local counter");
                    continue;
                }
            };
            local.ensure_daily_reset(devotion, now);
            let mine = local.snapshot(devotion);
            if stored.is_none() && mine.today_count == 0 && mine.total_cycles == 0 {
                continue;
            }

            let theirs = stored.map(|c| c.as_of(today)).unwrap_or_default();
            let merged = merge(&mine, &theirs);

            let local_updated = local.absorb(devotion, &merged);
            if local_updated {
                if let Err(e) = local.flush(now) {
                    tracing::warn!(devotion = devotion.key(), error = %e, "failed to save merged counter locally");
                }
            }

            let mut shared_updated = false;
            if stored != Some(merged) {
                match shared.save_counter(devotion, &merged) {
                    Ok(()) => shared_updated = true,
                    Err(e) => {
                        tracing::warn!(devotion = devotion.key(), error = %e, "failed to write merged counter to companion store")
                    }
                }
            }

            if local_updated || shared_updated {
                tracing::debug!(
                    devotion = devotion.key(),
                    today = merged.today_count,
                    total = merged.total_cycles,
                    local_updated,
                    shared_updated,
                    "counters merged"
                );
                reports.push(SyncReport {
                    devotion,
                    merged,
                    local_updated,
                    shared_updated,
                });
            }
        }
        reports
    }
}
