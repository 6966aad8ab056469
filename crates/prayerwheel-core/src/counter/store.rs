//! Daily counter store.
//!
//! Holds the authoritative in-memory counter for each devotion type and
//! mirrors it to durable storage in batches. The today-count is zeroed
//! lazily: the first access on a new calendar day performs the reset, so a
//! counter left untouched across midnight is corrected when next touched.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::debounce::SaveDebouncer;
use crate::devotion::DevotionType;
use crate::error::DatabaseError;
use crate::storage::CounterPersistence;

/// Counters for one devotion type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DevotionCounter {
    /// Rotations since the last daily reset.
    pub today_count: u64,
    /// Lifetime rotations.
    pub total_cycles: u64,
    /// Calendar day on which `today_count` was last zeroed.
    #[serde(default)]
    pub last_reset_day: Option<NaiveDate>,
}

impl DevotionCounter {
    /// True when `today_count` belongs to a day other than `day`.
    pub fn needs_reset(&self, day: NaiveDate) -> bool {
        self.last_reset_day != Some(day)
    }

    /// This counter as it reads on `day`, with a stale today-count zeroed.
    pub fn as_of(&self, day: NaiveDate) -> DevotionCounter {
        if self.needs_reset(day) {
            DevotionCounter {
                today_count: 0,
                total_cycles: self.total_cycles,
                last_reset_day: Some(day),
            }
        } else {
            *self
        }
    }
}

pub struct DailyCounterStore<P> {
    persistence: P,
    counters: HashMap<DevotionType, DevotionCounter>,
    dirty: BTreeSet<DevotionType>,
    debouncer: SaveDebouncer,
}

impl<P: CounterPersistence> DailyCounterStore<P> {
    pub fn new(persistence: P, flush_interval: Duration) -> Self {
        Self {
            persistence,
            counters: HashMap::new(),
            dirty: BTreeSet::new(),
            debouncer: SaveDebouncer::new(flush_interval),
        }
    }

    /// Zero the today-count if `now` falls on a different calendar day than
    /// the last reset. Returns true when a reset happened.
    pub fn ensure_daily_reset(&mut self, devotion: DevotionType, now: DateTime<FixedOffset>) -> bool {
        let today = now.date_naive();
        let counter = self.entry(devotion);
        if !counter.needs_reset(today) {
            return false;
        }
        *counter = counter.as_of(today);
        self.dirty.insert(devotion);
        tracing::debug!(devotion = devotion.key(), %today, "daily reset");
        true
    }

    /// Credit `by` whole rotations. Returns the updated counter.
    pub fn increment(
        &mut self,
        devotion: DevotionType,
        now: DateTime<FixedOffset>,
        by: u64,
    ) -> DevotionCounter {
        self.ensure_daily_reset(devotion, now);
        let counter = self.entry(devotion);
        counter.today_count = counter.today_count.saturating_add(by);
        counter.total_cycles = counter.total_cycles.saturating_add(by);
        let updated = *counter;
        self.dirty.insert(devotion);
        self.flush_if_due(now);
        updated
    }

    /// Zero both counters. The last-reset day is left as is.
    pub fn reset(&mut self, devotion: DevotionType, now: DateTime<FixedOffset>) {
        let counter = self.entry(devotion);
        counter.today_count = 0;
        counter.total_cycles = 0;
        self.dirty.insert(devotion);
        if let Err(e) = self.flush(now) {
            tracing::warn!(devotion = devotion.key(), error = %e, "failed to persist counter reset");
        }
    }

    /// Read-only copy of the in-memory counter, as last written. The
    /// today-count may belong to an earlier day; call `ensure_daily_reset`
    /// first when it must reflect today.
    pub fn snapshot(&mut self, devotion: DevotionType) -> DevotionCounter {
        *self.entry(devotion)
    }

    /// Fold a merged counter in, field by field, never lowering a value.
    /// Returns true if anything changed.
    pub fn absorb(&mut self, devotion: DevotionType, other: &DevotionCounter) -> bool {
        let counter = self.entry(devotion);
        let merged = DevotionCounter {
            today_count: counter.today_count.max(other.today_count),
            total_cycles: counter.total_cycles.max(other.total_cycles),
            last_reset_day: counter.last_reset_day.max(other.last_reset_day),
        };
        if merged == *counter {
            return false;
        }
        *counter = merged;
        self.dirty.insert(devotion);
        true
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Save if the debounce window has elapsed. Failures are logged and
    /// retried at the next window.
    pub fn flush_if_due(&mut self, now: DateTime<FixedOffset>) {
        if self.dirty.is_empty() || !self.debouncer.is_due(now) {
            return;
        }
        if let Err(e) = self.flush(now) {
            tracing::warn!(error = %e, "counter save failed; keeping changes in memory");
        }
    }

    /// Write every dirty counter now.
    pub fn flush(&mut self, now: DateTime<FixedOffset>) -> Result<(), DatabaseError> {
        self.debouncer.mark(now);
        while let Some(devotion) = self.dirty.first().copied() {
            let counter = self.counters.get(&devotion).copied().unwrap_or_default();
            self.persistence.save_counter(devotion, &counter)?;
            self.dirty.remove(&devotion);
            tracing::debug!(
                devotion = devotion.key(),
                today = counter.today_count,
                total = counter.total_cycles,
                "counter saved"
            );
        }
        Ok(())
    }

    fn entry(&mut self, devotion: DevotionType) -> &mut DevotionCounter {
        let persistence = &self.persistence;
        self.counters.entry(devotion).or_insert_with(|| {
            match persistence.load_counter(devotion) {
                Ok(stored) => stored.unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(devotion = devotion.key(), error = %e, "counter load failed; starting from zero");
                    DevotionCounter::default()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::TimeZone;
    use std::cell::Cell;

    fn day(d: u32, h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 11, d, h, 0, 0)
            .unwrap()
    }

    fn store(db: &Database) -> DailyCounterStore<&Database> {
        DailyCounterStore::new(db, Duration::minutes(10))
    }

    /// Fails every save until `healthy` is set.
    struct FlakyStore {
        healthy: Cell<bool>,
        saves: Cell<u32>,
    }

    impl CounterPersistence for FlakyStore {
        fn load_counter(&self, _: DevotionType) -> Result<Option<DevotionCounter>, DatabaseError> {
            Ok(None)
        }

        fn save_counter(&self, _: DevotionType, _: &DevotionCounter) -> Result<(), DatabaseError> {
            if self.healthy.get() {
                self.saves.set(self.saves.get() + 1);
                Ok(())
            } else {
                Err(DatabaseError::Locked)
            }
        }
    }

    #[test]
    fn increment_counts_today_and_total() {
        let db = Database::open_memory().unwrap();
        let mut counters = store(&db);
        counters.increment(DevotionType::Amitabha, day(10, 9), 1);
        let c = counters.increment(DevotionType::Amitabha, day(10, 10), 2);
        assert_eq!(c.today_count, 3);
        assert_eq!(c.total_cycles, 3);
        assert_eq!(c.last_reset_day, Some(day(10, 0).date_naive()));
    }

    #[test]
    fn daily_reset_is_idempotent_within_a_day() {
        let db = Database::open_memory().unwrap();
        let mut counters = store(&db);
        counters.increment(DevotionType::Guanyin, day(10, 9), 5);
        assert!(!counters.ensure_daily_reset(DevotionType::Guanyin, day(10, 12)));
        assert!(!counters.ensure_daily_reset(DevotionType::Guanyin, day(10, 12)));
        assert_eq!(counters.snapshot(DevotionType::Guanyin).today_count, 5);
    }

    #[test]
    fn cross_midnight_increment_resets_first() {
        let db = Database::open_memory().unwrap();
        let mut counters = store(&db);
        counters.increment(DevotionType::HeartSutra, day(10, 22), 7);
        let c = counters.increment(DevotionType::HeartSutra, day(11, 9), 1);
        assert_eq!(c.today_count, 1);
        assert_eq!(c.total_cycles, 8);
        assert_eq!(c.last_reset_day, Some(day(11, 0).date_naive()));
    }

    #[test]
    fn untouched_counter_is_corrected_on_next_access() {
        let db = Database::open_memory().unwrap();
        let mut counters = store(&db);
        counters.increment(DevotionType::Amitabha, day(10, 9), 4);
        assert_eq!(counters.snapshot(DevotionType::Amitabha).today_count, 4);
        assert!(counters.ensure_daily_reset(DevotionType::Amitabha, day(13, 7)));
        let c = counters.snapshot(DevotionType::Amitabha);
        assert_eq!(c.today_count, 0);
        assert_eq!(c.total_cycles, 4);
    }

    #[test]
    fn reset_keeps_last_reset_day() {
        let db = Database::open_memory().unwrap();
        let mut counters = store(&db);
        counters.increment(DevotionType::Amitabha, day(10, 9), 9);
        counters.reset(DevotionType::Amitabha, day(10, 9));
        let c = counters.snapshot(DevotionType::Amitabha);
        assert_eq!((c.today_count, c.total_cycles), (0, 0));
        assert_eq!(c.last_reset_day, Some(day(10, 0).date_naive()));
        assert_eq!(db.load_counter(DevotionType::Amitabha).unwrap(), Some(c));
    }

    #[test]
    fn saves_are_debounced() {
        let db = Database::open_memory().unwrap();
        let mut counters = store(&db);
        counters.increment(DevotionType::Amitabha, day(10, 9), 1);
        // first mutation of the session is written straight away
        assert_eq!(db.load_counter(DevotionType::Amitabha).unwrap().unwrap().total_cycles, 1);

        counters.increment(DevotionType::Amitabha, day(10, 9), 1);
        assert_eq!(db.load_counter(DevotionType::Amitabha).unwrap().unwrap().total_cycles, 1);
        assert!(counters.has_unsaved_changes());

        counters.increment(DevotionType::Amitabha, day(10, 9) + Duration::minutes(10), 1);
        assert_eq!(db.load_counter(DevotionType::Amitabha).unwrap().unwrap().total_cycles, 3);
        assert!(!counters.has_unsaved_changes());
    }

    #[test]
    fn loads_persisted_counter_lazily() {
        let db = Database::open_memory().unwrap();
        let stored = DevotionCounter {
            today_count: 3,
            total_cycles: 30,
            last_reset_day: Some(day(10, 0).date_naive()),
        };
        db.save_counter(DevotionType::Guanyin, &stored).unwrap();
        let mut counters = store(&db);
        let c = counters.increment(DevotionType::Guanyin, day(10, 11), 1);
        assert_eq!((c.today_count, c.total_cycles), (4, 31));
    }

    #[test]
    fn failed_saves_keep_memory_authoritative_and_retry() {
        let flaky = FlakyStore {
            healthy: Cell::new(false),
            saves: Cell::new(0),
        };
        let mut counters = DailyCounterStore::new(&flaky, Duration::minutes(10));
        let c = counters.increment(DevotionType::Amitabha, day(10, 9), 2);
        assert_eq!(c.total_cycles, 2);
        assert!(counters.has_unsaved_changes());

        flaky.healthy.set(true);
        counters.increment(DevotionType::Amitabha, day(10, 9) + Duration::minutes(5), 1);
        assert_eq!(flaky.saves.get(), 0);
        counters.increment(DevotionType::Amitabha, day(10, 9) + Duration::minutes(11), 1);
        assert_eq!(flaky.saves.get(), 1);
        assert!(!counters.has_unsaved_changes());
        assert_eq!(counters.snapshot(DevotionType::Amitabha).total_cycles, 4);
    }

    #[test]
    fn absorb_never_lowers() {
        let db = Database::open_memory().unwrap();
        let mut counters = store(&db);
        counters.increment(DevotionType::Amitabha, day(10, 9), 10);
        let lower = DevotionCounter {
            today_count: 2,
            total_cycles: 50,
            last_reset_day: Some(day(10, 0).date_naive()),
        };
        assert!(counters.absorb(DevotionType::Amitabha, &lower));
        let c = counters.snapshot(DevotionType::Amitabha);
        assert_eq!((c.today_count, c.total_cycles), (10, 50));
        assert!(!counters.absorb(DevotionType::Amitabha, &lower));
    }
}
