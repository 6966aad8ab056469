//! # Prayer Wheel Core Library
//!
//! This library provides the counting logic behind a digital prayer wheel:
//! turning wall-clock time into whole rotations, keeping daily and lifetime
//! counters per devotion type, crediting rotations missed while the app was
//! suspended, and merging counters with a companion store. Front ends (the
//! bundled CLI, or any other surface) drive a [`PrayerWheel`] and render the
//! [`Event`]s it returns.
//!
//! ## Architecture
//!
//! - **Rotation**: pure rotation math plus a wall-clock ticker that the
//!   caller polls; only whole rotations ever leave it
//! - **Counters**: lazily rolled-over daily counters with debounced saves
//! - **Compensation**: suspend snapshot and capped offline credit
//! - **Sync**: max-merge against a second store so both sides converge
//! - **History**: one record per devotion type and day, with summaries
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`PrayerWheel`]: Session wiring all components together
//! - [`DailyCounterStore`]: Today and lifetime counters
//! - [`OfflineCompensator`]: Suspend/resume compensation
//! - [`SyncMerger`]: Companion store reconciliation
//! - [`HistoryLedger`]: Per-day practice history
//! - [`Database`]: Persistence for all of the above
//! - [`Config`]: Application configuration management

pub mod compensation;
pub mod counter;
pub mod devotion;
pub mod error;
pub mod events;
pub mod format;
pub mod history;
pub mod rotation;
pub mod session;
pub mod storage;
pub mod sync;

pub use compensation::{Compensation, OfflineCompensator, SuspendSnapshot};
pub use counter::{DailyCounterStore, DevotionCounter, SaveDebouncer};
pub use devotion::DevotionType;
pub use error::{ConfigError, DatabaseError, ValidationError};
pub use events::Event;
pub use format::{format_count, format_offline_duration};
pub use history::{DailyHistoryRecord, HistoryLedger};
pub use rotation::{rotations_completed, RotationSpeed, RotationTicker, TickerState};
pub use session::{PracticeSummary, PrayerWheel};
pub use storage::{Config, Database};
pub use sync::{merge, SyncMerger, SyncReport};
