pub mod config;
pub mod counter;
pub mod devotion;
pub mod speed;
pub mod stats;
pub mod sync;
pub mod wheel;

use chrono::{DateTime, FixedOffset, Local};
use prayerwheel_core::sync::get_or_create_device_id;
use prayerwheel_core::{Config, Database, DevotionType, Event, PrayerWheel, RotationTicker, TickerState};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const TICKER_KEY: &str = "wheel_ticker";

pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Configuration plus the local database, shared by every command.
pub struct Context {
    pub config: Config,
    pub db: Database,
}

impl Context {
    pub fn open() -> CliResult<Self> {
        let config = Config::load_or_default();
        let device_id = get_or_create_device_id()?;
        let db = Database::open()?.with_device_id(device_id);
        Ok(Self { config, db })
    }

    /// Build a session from config, with the speed and devotion last chosen
    /// through the CLI taking precedence, and the ticker of the previous
    /// invocation restored.
    pub fn wheel(&self, now: DateTime<FixedOffset>) -> CliResult<PrayerWheel<&Database>> {
        let (wheel, events) = self.restore(now)?;
        if !events.is_empty() {
            tracing::info!(events = events.len(), "credited time the wheel spun while the CLI was not running");
        }
        Ok(wheel)
    }

    /// Like [`Context::wheel`], also returning the events from restoring a
    /// ticker left spinning.
    pub fn restore(&self, now: DateTime<FixedOffset>) -> CliResult<(PrayerWheel<&Database>, Vec<Event>)> {
        let mut config = self.config.clone();
        if let Some(speed) = self.db.rotation_speed()? {
            config.rotation.speed_rpm = speed.rpm();
        }
        if let Some(devotion) = self.db.selected_devotion()? {
            config.rotation.devotion = devotion;
        }

        let mut wheel = PrayerWheel::new(&self.db, &config);
        let mut events = Vec::new();
        if let Some(json) = self.db.kv_get(TICKER_KEY)? {
            match serde_json::from_str::<RotationTicker>(&json) {
                Ok(ticker) => events = wheel.restore_ticker(ticker, now),
                Err(e) => tracing::warn!(error = %e, "ignoring unreadable saved ticker"),
            }
        }
        if wheel.state() == TickerState::Spinning {
            // The gap is credited; the re-anchored ticker must be stored
            // even by commands that only read.
            wheel.flush(now)?;
            self.save_ticker(&wheel)?;
        }
        Ok((wheel, events))
    }

    /// Flush counters and remember the ticker and selections for next time.
    pub fn save(&self, wheel: &mut PrayerWheel<&Database>, now: DateTime<FixedOffset>) -> CliResult {
        wheel.flush(now)?;
        self.save_ticker(wheel)?;
        self.db.set_rotation_speed(wheel.speed())?;
        self.db.set_selected_devotion(wheel.devotion())?;
        Ok(())
    }

    fn save_ticker(&self, wheel: &PrayerWheel<&Database>) -> CliResult {
        self.db.kv_set(TICKER_KEY, &serde_json::to_string(wheel.ticker())?)?;
        Ok(())
    }

    /// The `--devotion` argument, or the current selection.
    pub fn devotion_or_selected(&self, arg: Option<DevotionType>) -> CliResult<DevotionType> {
        Ok(match arg {
            Some(devotion) => devotion,
            None => self
                .db
                .selected_devotion()?
                .unwrap_or(self.config.rotation.devotion),
        })
    }
}

/// Print events as JSON lines.
pub fn print_events(events: &[Event]) -> CliResult {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
