//! Per-day practice history.
//!
//! One record per (devotion type, calendar day) holding that day's
//! today-count. Later writes for the same day overwrite the earlier value.
//! Records live in memory and are flushed to storage in batches.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::counter::SaveDebouncer;
use crate::devotion::DevotionType;
use crate::error::DatabaseError;
use crate::storage::HistoryPersistence;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyHistoryRecord {
    pub date: NaiveDate,
    pub devotion: DevotionType,
    pub cycles_completed: u64,
}

type RecordKey = (DevotionType, NaiveDate);

pub struct HistoryLedger<H> {
    persistence: H,
    records: BTreeMap<RecordKey, u64>,
    dirty: BTreeSet<RecordKey>,
    debouncer: SaveDebouncer,
}

impl<H: HistoryPersistence> HistoryLedger<H> {
    /// Load existing history. A failed load is logged and the ledger starts
    /// empty; only records touched afterwards are ever written back.
    pub fn load(persistence: H, flush_interval: Duration) -> Self {
        let records = match persistence.load_history() {
            Ok(records) => records
                .into_iter()
                .map(|r| ((r.devotion, r.date), r.cycles_completed))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load practice history");
                BTreeMap::new()
            }
        };
        Self {
            persistence,
            records,
            dirty: BTreeSet::new(),
            debouncer: SaveDebouncer::new(flush_interval),
        }
    }

    /// Upsert the record for `(devotion, date)`.
    pub fn record(&mut self, devotion: DevotionType, date: NaiveDate, cycles_completed: u64) {
        let previous = self.records.insert((devotion, date), cycles_completed);
        if previous != Some(cycles_completed) {
            self.dirty.insert((devotion, date));
        }
    }

    pub fn get(&self, devotion: DevotionType, date: NaiveDate) -> Option<DailyHistoryRecord> {
        self.records.get(&(devotion, date)).map(|&cycles_completed| DailyHistoryRecord {
            date,
            devotion,
            cycles_completed,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Consecutive active days ending at `as_of`, walking backwards until
    /// the first day with no activity.
    pub fn streak(&self, devotion: DevotionType, as_of: NaiveDate) -> u32 {
        let mut streak = 0;
        let mut day = as_of;
        while self.is_active(devotion, day) {
            streak += 1;
            match day.pred_opt() {
                Some(previous) => day = previous,
                None => break,
            }
        }
        streak
    }

    /// Sum of cycles over `[from, to]`.
    pub fn sum(&self, devotion: DevotionType, from: NaiveDate, to: NaiveDate) -> u64 {
        if from > to {
            return 0;
        }
        self.records
            .range((devotion, from)..=(devotion, to))
            .map(|(_, cycles)| *cycles)
            .sum()
    }

    /// Distinct days with any activity, for one devotion type or across all.
    pub fn distinct_active_days(&self, devotion: Option<DevotionType>) -> usize {
        self.records
            .iter()
            .filter(|((t, _), cycles)| **cycles > 0 && devotion.map_or(true, |d| d == *t))
            .map(|((_, date), _)| *date)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Records for `devotion` in `[from, to]`, oldest first.
    pub fn records(&self, devotion: DevotionType, from: NaiveDate, to: NaiveDate) -> Vec<DailyHistoryRecord> {
        if from > to {
            return Vec::new();
        }
        self.records
            .range((devotion, from)..=(devotion, to))
            .map(|(&(devotion, date), &cycles_completed)| DailyHistoryRecord {
                date,
                devotion,
                cycles_completed,
            })
            .collect()
    }

    /// Records for the `days` days ending at `as_of`.
    pub fn recent(&self, devotion: DevotionType, as_of: NaiveDate, days: u32) -> Vec<DailyHistoryRecord> {
        if days == 0 {
            return Vec::new();
        }
        let from = days_before(as_of, u64::from(days) - 1);
        self.records(devotion, from, as_of)
    }

    /// Cycles from the start of the week containing `as_of` through `as_of`.
    pub fn weekly_summary(&self, devotion: DevotionType, as_of: NaiveDate, week_start: Weekday) -> u64 {
        let back = (7 + as_of.weekday().num_days_from_monday() - week_start.num_days_from_monday()) % 7;
        self.sum(devotion, days_before(as_of, u64::from(back)), as_of)
    }

    /// Cycles from the first of the month through `as_of`.
    pub fn monthly_summary(&self, devotion: DevotionType, as_of: NaiveDate) -> u64 {
        let first = as_of.with_day(1).unwrap_or(as_of);
        self.sum(devotion, first, as_of)
    }

    pub fn total_summary(&self, devotion: DevotionType) -> u64 {
        self.sum(devotion, NaiveDate::MIN, NaiveDate::MAX)
    }

    /// Mean cycles over the records present in the `days` days ending at
    /// `as_of`. Days without a record are not counted.
    pub fn average_daily(&self, devotion: DevotionType, as_of: NaiveDate, days: u32) -> u64 {
        let recent = self.recent(devotion, as_of, days);
        if recent.is_empty() {
            return 0;
        }
        let total: u64 = recent.iter().map(|r| r.cycles_completed).sum();
        total / recent.len() as u64
    }

    pub fn max_daily(&self, devotion: DevotionType) -> u64 {
        self.records
            .range((devotion, NaiveDate::MIN)..=(devotion, NaiveDate::MAX))
            .map(|(_, cycles)| *cycles)
            .max()
            .unwrap_or(0)
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub fn flush_if_due(&mut self, now: DateTime<FixedOffset>) {
        if self.dirty.is_empty() || !self.debouncer.is_due(now) {
            return;
        }
        if let Err(e) = self.flush(now) {
            tracing::warn!(error = %e, "history save failed; keeping changes in memory");
        }
    }

    pub fn flush(&mut self, now: DateTime<FixedOffset>) -> Result<(), DatabaseError> {
        self.debouncer.mark(now);
        if self.dirty.is_empty() {
            return Ok(());
        }
        let batch: Vec<DailyHistoryRecord> = self
            .dirty
            .iter()
            .filter_map(|&(devotion, date)| self.get(devotion, date))
            .collect();
        self.persistence.save_history(&batch)?;
        tracing::debug!(records = batch.len(), "history saved");
        self.dirty.clear();
        Ok(())
    }

    /// Delete history for one devotion type, or all of it.
    pub fn clear(&mut self, devotion: Option<DevotionType>) -> Result<(), DatabaseError> {
        self.persistence.delete_history(devotion)?;
        let keep = |t: &DevotionType| devotion.map_or(false, |d| d != *t);
        self.records.retain(|(t, _), _| keep(t));
        self.dirty.retain(|(t, _)| keep(t));
        Ok(())
    }

    fn is_active(&self, devotion: DevotionType, date: NaiveDate) -> bool {
        self.records.get(&(devotion, date)).is_some_and(|c| *c > 0)
    }
}

/// `n` days before `date`, saturating at the earliest representable day.
fn days_before(date: NaiveDate, n: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn ledger(db: &Database) -> HistoryLedger<&Database> {
        HistoryLedger::load(db, Duration::minutes(10))
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let db = Database::open_memory().unwrap();
        let mut h = ledger(&db);
        h.record(DevotionType::Amitabha, d(11, 10), 5);
        h.record(DevotionType::Amitabha, d(11, 9), 1);
        h.record(DevotionType::Amitabha, d(11, 8), 3);
        h.record(DevotionType::Amitabha, d(11, 6), 3);
        assert_eq!(h.streak(DevotionType::Amitabha, d(11, 10)), 3);
        assert_eq!(h.streak(DevotionType::Amitabha, d(11, 11)), 0);
        assert_eq!(h.streak(DevotionType::Guanyin, d(11, 10)), 0);
    }

    #[test]
    fn zero_day_breaks_streak() {
        let db = Database::open_memory().unwrap();
        let mut h = ledger(&db);
        h.record(DevotionType::Amitabha, d(11, 10), 5);
        h.record(DevotionType::Amitabha, d(11, 9), 0);
        h.record(DevotionType::Amitabha, d(11, 8), 3);
        assert_eq!(h.streak(DevotionType::Amitabha, d(11, 10)), 1);
    }

    #[test]
    fn later_writes_overwrite_same_day() {
        let db = Database::open_memory().unwrap();
        let mut h = ledger(&db);
        h.record(DevotionType::Amitabha, d(11, 10), 5);
        h.record(DevotionType::Amitabha, d(11, 10), 8);
        assert_eq!(h.sum(DevotionType::Amitabha, d(11, 10), d(11, 10)), 8);
        assert_eq!(h.records(DevotionType::Amitabha, d(1, 1), d(12, 31)).len(), 1);
    }

    #[test]
    fn sum_is_inclusive_and_per_type() {
        let db = Database::open_memory().unwrap();
        let mut h = ledger(&db);
        h.record(DevotionType::Amitabha, d(11, 1), 1);
        h.record(DevotionType::Amitabha, d(11, 5), 10);
        h.record(DevotionType::Amitabha, d(11, 9), 100);
        h.record(DevotionType::Guanyin, d(11, 5), 1000);
        assert_eq!(h.sum(DevotionType::Amitabha, d(11, 1), d(11, 5)), 11);
        assert_eq!(h.sum(DevotionType::Amitabha, d(11, 2), d(11, 9)), 110);
        assert_eq!(h.sum(DevotionType::Amitabha, d(11, 9), d(11, 1)), 0);
        assert_eq!(h.total_summary(DevotionType::Guanyin), 1000);
    }

    #[test]
    fn distinct_days_per_type_or_across_types() {
        let db = Database::open_memory().unwrap();
        let mut h = ledger(&db);
        h.record(DevotionType::Amitabha, d(11, 1), 1);
        h.record(DevotionType::Guanyin, d(11, 1), 2);
        h.record(DevotionType::Guanyin, d(11, 2), 2);
        h.record(DevotionType::HeartSutra, d(11, 3), 0);
        assert_eq!(h.distinct_active_days(Some(DevotionType::Amitabha)), 1);
        assert_eq!(h.distinct_active_days(Some(DevotionType::Guanyin)), 2);
        assert_eq!(h.distinct_active_days(None), 2);
    }

    #[test]
    fn week_and_month_windows() {
        let db = Database::open_memory().unwrap();
        let mut h = ledger(&db);
        // 2025-11-10 is a Monday
        h.record(DevotionType::Amitabha, d(11, 9), 1);
        h.record(DevotionType::Amitabha, d(11, 10), 10);
        h.record(DevotionType::Amitabha, d(11, 12), 100);
        h.record(DevotionType::Amitabha, d(10, 31), 1000);
        assert_eq!(h.weekly_summary(DevotionType::Amitabha, d(11, 12), Weekday::Mon), 110);
        assert_eq!(h.weekly_summary(DevotionType::Amitabha, d(11, 12), Weekday::Sun), 111);
        assert_eq!(h.monthly_summary(DevotionType::Amitabha, d(11, 12)), 111);
    }

    #[test]
    fn average_counts_only_recorded_days() {
        let db = Database::open_memory().unwrap();
        let mut h = ledger(&db);
        h.record(DevotionType::Amitabha, d(11, 1), 10);
        h.record(DevotionType::Amitabha, d(11, 10), 30);
        h.record(DevotionType::Amitabha, d(9, 1), 500);
        assert_eq!(h.average_daily(DevotionType::Amitabha, d(11, 10), 30), 20);
        assert_eq!(h.max_daily(DevotionType::Amitabha), 500);
        assert_eq!(h.recent(DevotionType::Amitabha, d(11, 10), 1).len(), 1);
    }

    #[test]
    fn flush_persists_and_reload_restores() {
        let db = Database::open_memory().unwrap();
        let now = chrono::Utc::now().fixed_offset();
        {
            let mut h = ledger(&db);
            h.record(DevotionType::Amitabha, d(11, 9), 4);
            h.record(DevotionType::Guanyin, d(11, 9), 6);
            h.flush(now).unwrap();
        }
        let h = ledger(&db);
        assert_eq!(h.get(DevotionType::Amitabha, d(11, 9)).unwrap().cycles_completed, 4);
        assert_eq!(h.get(DevotionType::Guanyin, d(11, 9)).unwrap().cycles_completed, 6);
    }

    #[test]
    fn clear_one_type_keeps_others() {
        let db = Database::open_memory().unwrap();
        let now = chrono::Utc::now().fixed_offset();
        let mut h = ledger(&db);
        h.record(DevotionType::Amitabha, d(11, 9), 4);
        h.record(DevotionType::Guanyin, d(11, 9), 6);
        h.flush(now).unwrap();
        h.clear(Some(DevotionType::Amitabha)).unwrap();
        assert!(h.get(DevotionType::Amitabha, d(11, 9)).is_none());
        assert!(h.get(DevotionType::Guanyin, d(11, 9)).is_some());
        assert_eq!(ledger(&db).total_summary(DevotionType::Guanyin), 6);
        assert_eq!(ledger(&db).total_summary(DevotionType::Amitabha), 0);
    }

    #[test]
    fn huge_window_reaches_back_to_the_first_record() {
        let db = Database::open_memory().unwrap();
        let mut h = ledger(&db);
        h.record(DevotionType::Amitabha, d(1, 2), 4);
        h.record(DevotionType::Amitabha, d(11, 10), 8);
        assert_eq!(h.recent(DevotionType::Amitabha, d(11, 10), u32::MAX).len(), 2);
        assert_eq!(h.average_daily(DevotionType::Amitabha, d(11, 10), u32::MAX), 6);
    }
}
