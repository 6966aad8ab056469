//! Integration tests for offline compensation.
//!
//! Exercises the suspend/resume cycle across separate database handles, the
//! way an app sees it when the process is killed while backgrounded.

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use prayerwheel_core::storage::SnapshotPersistence;
use prayerwheel_core::{
    Config, Database, DevotionType, Event, OfflineCompensator, PrayerWheel, RotationSpeed, RotationTicker,
    TickerState,
};

fn morning() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(8 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 11, 10, 7, 30, 0)
        .unwrap()
}

#[test]
fn test_long_absence_is_capped_at_one_day() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prayerwheel.db");
    let closed_at = morning();

    {
        let db = Database::open_at(&path).unwrap();
        let mut wheel = PrayerWheel::new(&db, &Config::default());
        wheel.set_speed(RotationSpeed::new(600.0).unwrap(), closed_at);
        wheel.suspend(closed_at);
    }

    let db = Database::open_at(&path).unwrap();
    let mut wheel = PrayerWheel::new(&db, &Config::default());
    let back = closed_at + Duration::hours(48);
    let events = wheel.resume(back);

    let compensated = events
        .iter()
        .find_map(|e| match e {
            Event::RotationsCompensated { rotations, capped, offline_secs, .. } => {
                Some((*rotations, *capped, *offline_secs))
            }
            _ => None,
        })
        .expect("compensation event");
    assert_eq!(compensated, (864_000, true, 48 * 3600));

    // All credit lands on the resume day.
    let counter = wheel.counter(DevotionType::Amitabha, back);
    assert_eq!(counter.today_count, 864_000);
    assert_eq!(counter.total_cycles, 864_000);
    assert!(db.load_snapshot().unwrap().is_none());
}

#[test]
fn test_zero_compensation_is_silent() {
    let db = Database::open_memory().unwrap();
    let mut wheel = PrayerWheel::new(&db, &Config::default());
    let t = morning();
    wheel.suspend(t);

    // 30 rpm needs 2 s for one rotation
    let events = wheel.resume(t + Duration::seconds(1));
    assert!(!events.iter().any(|e| matches!(e, Event::RotationsCompensated { .. })));
    assert!(events.iter().any(|e| matches!(e, Event::SessionResumed { .. })));
}

#[test]
fn test_clock_skew_credits_nothing() {
    let db = Database::open_memory().unwrap();
    let mut wheel = PrayerWheel::new(&db, &Config::default());
    let t = morning();
    wheel.suspend(t);
    wheel.resume(t - Duration::hours(3));
    assert_eq!(wheel.counter(DevotionType::Amitabha, t).total_cycles, 0);
}

#[test]
fn test_retained_snapshot_recounts_from_same_close_time() {
    let db = Database::open_memory().unwrap();
    let t = morning();
    let mut compensator = OfflineCompensator::new(&db, Duration::hours(24)).retain_snapshot_after_reconcile(true);
    compensator.snapshot(30.0, DevotionType::HeartSutra, t);

    let mut credited = 0u64;
    compensator.reconcile(t + Duration::minutes(1), |_| credited += 1);
    compensator.reconcile(t + Duration::minutes(1), |_| credited += 1);
    assert_eq!(credited, 60);
    assert!(compensator.has_snapshot());
}

#[test]
fn test_compensation_goes_to_devotion_at_close() {
    let db = Database::open_memory().unwrap();
    let t = morning();
    {
        let mut wheel = PrayerWheel::new(&db, &Config::default());
        wheel.select_devotion(DevotionType::SixSyllableMantra, t);
        wheel.suspend(t);
    }

    let mut config = Config::default();
    config.rotation.devotion = DevotionType::Guanyin;
    let mut wheel = PrayerWheel::new(&db, &config);
    wheel.resume(t + Duration::minutes(5));

    assert_eq!(wheel.counter(DevotionType::SixSyllableMantra, t).total_cycles, 150);
    assert_eq!(wheel.counter(DevotionType::Guanyin, t).total_cycles, 0);
}

fn completed(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::RotationCompleted { .. }))
        .count()
}

#[test]
fn test_resume_on_next_day_rolls_over_before_crediting() {
    let db = Database::open_memory().unwrap();
    let closed_at = morning();
    {
        let mut wheel = PrayerWheel::new(&db, &Config::default());
        wheel.spin(7, closed_at);
        wheel.suspend(closed_at);
    }

    let mut wheel = PrayerWheel::new(&db, &Config::default());
    let back = closed_at + Duration::hours(23);
    let events = wheel.resume(back);
    assert!(events.iter().any(|e| matches!(e, Event::DailyReset { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::RotationsCompensated { rotations: 41_400, capped: false, .. }
    )));

    let counter = wheel.counter(DevotionType::Amitabha, back);
    assert_eq!(counter.today_count, 41_400);
    assert_eq!(counter.total_cycles, 7 + 41_400);
    let history = wheel.history();
    assert_eq!(history.get(DevotionType::Amitabha, closed_at.date_naive()).unwrap().cycles_completed, 7);
    assert_eq!(history.get(DevotionType::Amitabha, back.date_naive()).unwrap().cycles_completed, 41_400);
}

#[test]
fn test_ticker_left_spinning_is_capped_like_a_suspend() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prayerwheel.db");
    let started = morning();

    let saved = {
        let db = Database::open_at(&path).unwrap();
        let mut wheel = PrayerWheel::new(&db, &Config::default());
        wheel.set_speed(RotationSpeed::new(600.0).unwrap(), started);
        wheel.start(started);
        wheel.flush(started).unwrap();
        serde_json::to_string(wheel.ticker()).unwrap()
    };

    let db = Database::open_at(&path).unwrap();
    let mut wheel = PrayerWheel::new(&db, &Config::default());
    let back = started + Duration::hours(48);
    let ticker: RotationTicker = serde_json::from_str(&saved).unwrap();
    let events = wheel.restore_ticker(ticker, back);

    assert_eq!(completed(&events), 0);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::RotationsCompensated { rotations: 864_000, capped: true, .. }
    )));
    assert_eq!(wheel.state(), TickerState::Spinning);
    assert_eq!(wheel.counter(DevotionType::Amitabha, back).total_cycles, 864_000);

    // Ticking carries on from the restore instant, not from the old anchor.
    let events = wheel.tick(back + Duration::milliseconds(1050));
    assert_eq!(completed(&events), 10);
    assert_eq!(wheel.counter(DevotionType::Amitabha, back).total_cycles, 864_010);
    assert!(db.load_snapshot().unwrap().is_none());
}

#[test]
fn test_restored_paused_ticker_credits_nothing() {
    let db = Database::open_memory().unwrap();
    let t = morning();
    let mut ticker = RotationTicker::default();
    ticker.start(t);
    ticker.pause(t);

    let mut wheel = PrayerWheel::new(&db, &Config::default());
    assert!(wheel.restore_ticker(ticker, t + Duration::hours(5)).is_empty());
    assert_eq!(wheel.state(), TickerState::Paused);
    assert_eq!(wheel.counter(DevotionType::Amitabha, t).total_cycles, 0);
}
