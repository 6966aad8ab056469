//! Wheel session.
//!
//! `PrayerWheel` is the single owner of counter state for a process. Front
//! ends construct one explicitly, feed it wall-clock instants, and render the
//! events it returns. Whole rotations from the ticker, manual spins and
//! offline compensation all go through the same increment path, which keeps
//! the daily counter and the history ledger in step.

use chrono::{DateTime, FixedOffset, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::compensation::{Compensation, OfflineCompensator};
use crate::counter::{DailyCounterStore, DevotionCounter};
use crate::devotion::DevotionType;
use crate::error::DatabaseError;
use crate::events::Event;
use crate::history::HistoryLedger;
use crate::rotation::{RotationSpeed, RotationTicker, TickerState};
use crate::storage::{Config, CounterPersistence, HistoryPersistence, SnapshotPersistence};
use crate::sync::SyncMerger;

/// Statistics for one devotion type as of a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSummary {
    pub devotion: DevotionType,
    pub as_of: NaiveDate,
    pub today_count: u64,
    pub total_cycles: u64,
    pub streak_days: u32,
    /// Days practiced with this devotion type.
    pub active_days: usize,
    /// Days practiced with any devotion type.
    pub active_days_all: usize,
    pub week: u64,
    pub month: u64,
    pub recorded_total: u64,
    pub average_daily: u64,
    pub max_daily: u64,
}

pub struct PrayerWheel<S> {
    devotion: DevotionType,
    ticker: RotationTicker,
    counters: DailyCounterStore<S>,
    compensator: OfflineCompensator<S>,
    ledger: HistoryLedger<S>,
    compensation_enabled: bool,
    week_start: Weekday,
    average_window_days: u32,
}

impl<S> PrayerWheel<S>
where
    S: CounterPersistence + SnapshotPersistence + HistoryPersistence + Clone,
{
    pub fn new(store: S, config: &Config) -> Self {
        let flush_interval = config.flush_interval();
        Self {
            devotion: config.rotation.devotion,
            ticker: RotationTicker::new(config.rotation_speed()),
            counters: DailyCounterStore::new(store.clone(), flush_interval),
            compensator: OfflineCompensator::new(store.clone(), config.max_offline())
                .retain_snapshot_after_reconcile(!config.compensation.clear_snapshot_after_reconcile),
            ledger: HistoryLedger::load(store, flush_interval),
            compensation_enabled: config.compensation.enabled,
            week_start: config.history.week_starts_on,
            average_window_days: config.history.average_window_days,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn devotion(&self) -> DevotionType {
        self.devotion
    }

    pub fn speed(&self) -> RotationSpeed {
        self.ticker.speed()
    }

    pub fn state(&self) -> TickerState {
        self.ticker.state()
    }

    /// Wheel angle for the rotation in progress.
    pub fn angle_degrees(&self) -> f64 {
        self.ticker.angle_degrees()
    }

    pub fn ticker(&self) -> &RotationTicker {
        &self.ticker
    }

    /// Continue from a ticker saved by an earlier process. Its speed wins
    /// over the configured one.
    ///
    /// A ticker saved while spinning kept no time while nothing was running,
    /// so the gap since its last tick is credited as offline time, under the
    /// same cap as a suspend and resume.
    pub fn restore_ticker(&mut self, mut ticker: RotationTicker, now: DateTime<FixedOffset>) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(since) = ticker.reanchor(now) {
            if self.compensation_enabled {
                let counters = &mut self.counters;
                let ledger = &mut self.ledger;
                let compensation =
                    self.compensator
                        .compensate_gap(ticker.speed().rpm(), self.devotion, since, now, |devotion| {
                            apply_rotations(counters, ledger, devotion, 1, now, &mut events);
                        });
                events.extend(compensated_event(compensation, now));
            } else {
                tracing::debug!(%since, "offline compensation disabled; dropping gap of restored ticker");
            }
        }
        self.ticker = ticker;
        events
    }

    pub fn history(&self) -> &HistoryLedger<S> {
        &self.ledger
    }

    pub fn history_mut(&mut self) -> &mut HistoryLedger<S> {
        &mut self.ledger
    }

    pub fn compensator(&self) -> &OfflineCompensator<S> {
        &self.compensator
    }

    /// Current counter for `devotion`, rolled over to `now`'s day first.
    pub fn counter(&mut self, devotion: DevotionType, now: DateTime<FixedOffset>) -> DevotionCounter {
        self.counters.ensure_daily_reset(devotion, now);
        self.counters.snapshot(devotion)
    }

    pub fn summary(&mut self, devotion: DevotionType, now: DateTime<FixedOffset>) -> PracticeSummary {
        let counter = self.counter(devotion, now);
        let today = now.date_naive();
        let ledger = &self.ledger;
        PracticeSummary {
            devotion,
            as_of: today,
            today_count: counter.today_count,
            total_cycles: counter.total_cycles,
            streak_days: ledger.streak(devotion, today),
            active_days: ledger.distinct_active_days(Some(devotion)),
            active_days_all: ledger.distinct_active_days(None),
            week: ledger.weekly_summary(devotion, today, self.week_start),
            month: ledger.monthly_summary(devotion, today),
            recorded_total: ledger.total_summary(devotion),
            average_daily: ledger.average_daily(devotion, today, self.average_window_days),
            max_daily: ledger.max_daily(devotion),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, now: DateTime<FixedOffset>) -> Vec<Event> {
        let mut events = Vec::new();
        if self.counters.ensure_daily_reset(self.devotion, now) {
            events.push(Event::DailyReset {
                devotion: self.devotion,
                at: now,
            });
        }
        self.ticker.start(now);
        events
    }

    pub fn pause(&mut self, now: DateTime<FixedOffset>) -> Vec<Event> {
        let completed = self.ticker.pause(now);
        self.credit(self.devotion, completed, now)
    }

    /// Advance the wheel to `now`. Call periodically while spinning.
    pub fn tick(&mut self, now: DateTime<FixedOffset>) -> Vec<Event> {
        let completed = self.ticker.tick(now);
        let events = self.credit(self.devotion, completed, now);
        self.counters.flush_if_due(now);
        self.ledger.flush_if_due(now);
        events
    }

    /// Credit whole rotations turned by hand.
    pub fn spin(&mut self, rotations: u64, now: DateTime<FixedOffset>) -> Vec<Event> {
        self.credit(self.devotion, rotations, now)
    }

    /// Switch devotion type. Progress so far is credited to the old one.
    pub fn select_devotion(&mut self, devotion: DevotionType, now: DateTime<FixedOffset>) -> Vec<Event> {
        let completed = self.ticker.tick(now);
        let mut events = self.credit(self.devotion, completed, now);
        self.devotion = devotion;
        if self.counters.ensure_daily_reset(devotion, now) {
            events.push(Event::DailyReset { devotion, at: now });
        }
        events
    }

    pub fn set_speed(&mut self, speed: RotationSpeed, now: DateTime<FixedOffset>) -> Vec<Event> {
        let completed = self.ticker.set_speed(speed, now);
        self.credit(self.devotion, completed, now)
    }

    /// Stop the wheel, snapshot for offline compensation and save everything.
    pub fn suspend(&mut self, now: DateTime<FixedOffset>) -> Vec<Event> {
        let mut events = self.pause(now);
        let speed_rpm = self.speed().rpm();
        self.compensator.snapshot(speed_rpm, self.devotion, now);
        if let Err(e) = self.flush(now) {
            tracing::warn!(error = %e, "failed to save on suspend");
        }
        events.push(Event::SessionSuspended {
            devotion: self.devotion,
            speed_rpm,
            at: now,
        });
        events
    }

    /// Credit rotations missed while suspended, then start spinning again.
    pub fn resume(&mut self, now: DateTime<FixedOffset>) -> Vec<Event> {
        let mut events = Vec::new();
        if self.compensation_enabled {
            let counters = &mut self.counters;
            let ledger = &mut self.ledger;
            let compensation = self.compensator.reconcile(now, |devotion| {
                apply_rotations(counters, ledger, devotion, 1, now, &mut events);
            });
            events.extend(compensated_event(compensation, now));
        } else if self.compensator.has_snapshot() {
            tracing::debug!("offline compensation disabled; discarding snapshot");
            self.compensator.discard();
        }

        events.extend(self.start(now));
        events.push(Event::SessionResumed { at: now });
        events
    }

    /// Zero both counters for `devotion`. History is untouched.
    pub fn reset_counter(&mut self, devotion: DevotionType, now: DateTime<FixedOffset>) -> Vec<Event> {
        self.counters.reset(devotion, now);
        vec![Event::CounterReset { devotion, at: now }]
    }

    /// Max-merge every devotion type with the companion store.
    pub fn sync_with<T>(&mut self, shared: Option<&T>, now: DateTime<FixedOffset>) -> Vec<Event>
    where
        T: CounterPersistence + ?Sized,
    {
        let today = now.date_naive();
        SyncMerger::sync(&mut self.counters, shared, &DevotionType::ALL, now)
            .into_iter()
            .map(|report| {
                if report.local_updated {
                    self.ledger.record(report.devotion, today, report.merged.today_count);
                }
                Event::CountersMerged {
                    devotion: report.devotion,
                    merged: report.merged,
                    local_updated: report.local_updated,
                    shared_updated: report.shared_updated,
                    at: now,
                }
            })
            .collect()
    }

    /// Save counters and history now.
    pub fn flush(&mut self, now: DateTime<FixedOffset>) -> Result<(), DatabaseError> {
        let counters = self.counters.flush(now);
        let history = self.ledger.flush(now);
        counters.and(history)
    }

    fn credit(&mut self, devotion: DevotionType, rotations: u64, now: DateTime<FixedOffset>) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..rotations {
            let counter = apply_rotations(&mut self.counters, &mut self.ledger, devotion, 1, now, &mut events);
            events.push(Event::RotationCompleted {
                devotion,
                today_count: counter.today_count,
                total_cycles: counter.total_cycles,
                at: now,
            });
        }
        events
    }
}

fn compensated_event(compensation: Option<Compensation>, now: DateTime<FixedOffset>) -> Option<Event> {
    compensation
        .filter(|c| c.rotations > 0)
        .map(|c| Event::RotationsCompensated {
            devotion: c.devotion,
            rotations: c.rotations,
            offline_secs: c.offline.num_seconds(),
            capped: c.capped,
            at: now,
        })
}

/// The one increment path: roll the day over, count, mirror into history.
fn apply_rotations<S>(
    counters: &mut DailyCounterStore<S>,
    ledger: &mut HistoryLedger<S>,
    devotion: DevotionType,
    by: u64,
    now: DateTime<FixedOffset>,
    events: &mut Vec<Event>,
) -> DevotionCounter
where
    S: CounterPersistence + HistoryPersistence,
{
    if counters.ensure_daily_reset(devotion, now) {
        events.push(Event::DailyReset { devotion, at: now });
    }
    let counter = counters.increment(devotion, now, by);
    ledger.record(devotion, now.date_naive(), counter.today_count);
    ledger.flush_if_due(now);
    counter
}
