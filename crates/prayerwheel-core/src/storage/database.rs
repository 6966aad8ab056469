//! SQLite-backed counter storage.
//!
//! Provides persistent storage for:
//! - Per-devotion counters (today and lifetime)
//! - The suspend snapshot used for offline compensation
//! - Daily practice history
//! - Key-value store for settings (rotation speed, selected devotion)
//!
//! The same schema serves the local store and the companion store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::compensation::SuspendSnapshot;
use crate::counter::DevotionCounter;
use crate::devotion::DevotionType;
use crate::error::DatabaseError;
use crate::history::DailyHistoryRecord;
use crate::rotation::RotationSpeed;

use super::traits::{CounterPersistence, HistoryPersistence, SnapshotPersistence};
use super::{data_dir, migrations};

const DAY_FORMAT: &str = "%Y-%m-%d";
const KEY_ROTATION_SPEED: &str = "rotation_speed";
const KEY_SELECTED_DEVOTION: &str = "selected_devotion";

/// Who last wrote a counter row, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterProvenance {
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

/// SQLite database for counter storage.
pub struct Database {
    conn: Connection,
    device_id: Option<String>,
}

impl Database {
    /// Open the database at `~/.config/prayerwheel/prayerwheel.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        Self::open_at(&data_dir()?.join("prayerwheel.db"))
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn,
            device_id: None,
        })
    }

    /// Stamp counter writes with this device id.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Id stamped on counter writes, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Stored rotation speed, clamped into range.
    pub fn rotation_speed(&self) -> Result<Option<RotationSpeed>, DatabaseError> {
        let Some(raw) = self.kv_get(KEY_ROTATION_SPEED)? else {
            return Ok(None);
        };
        let rpm = raw.parse::<f64>().map_err(|e| DatabaseError::InvalidData {
            key: KEY_ROTATION_SPEED.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(RotationSpeed::clamped(rpm)))
    }

    pub fn set_rotation_speed(&self, speed: RotationSpeed) -> Result<(), DatabaseError> {
        self.kv_set(KEY_ROTATION_SPEED, &speed.rpm().to_string())
    }

    pub fn selected_devotion(&self) -> Result<Option<DevotionType>, DatabaseError> {
        self.kv_get(KEY_SELECTED_DEVOTION)?
            .map(|raw| parse_devotion(KEY_SELECTED_DEVOTION, &raw))
            .transpose()
    }

    pub fn set_selected_devotion(&self, devotion: DevotionType) -> Result<(), DatabaseError> {
        self.kv_set(KEY_SELECTED_DEVOTION, devotion.key())
    }

    // ── Counters ─────────────────────────────────────────────────────

    pub fn counter_provenance(&self, devotion: DevotionType) -> Result<Option<CounterProvenance>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT updated_at, updated_by FROM counters WHERE devotion = ?1",
                params![devotion.key()],
                |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        let Some((Some(updated_at), updated_by)) = row else {
            return Ok(None);
        };
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| DatabaseError::InvalidData {
                key: format!("counters.{}.updated_at", devotion.key()),
                message: e.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Some(CounterProvenance {
            updated_at,
            updated_by,
        }))
    }
}

impl CounterPersistence for Database {
    fn load_counter(&self, devotion: DevotionType) -> Result<Option<DevotionCounter>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT today_count, total_cycles, last_reset_day FROM counters WHERE devotion = ?1",
                params![devotion.key()],
                |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, u64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((today_count, total_cycles, last_reset_day)) = row else {
            return Ok(None);
        };
        let last_reset_day = last_reset_day
            .map(|raw| parse_day(&format!("counters.{}.last_reset_day", devotion.key()), &raw))
            .transpose()?;
        Ok(Some(DevotionCounter {
            today_count,
            total_cycles,
            last_reset_day,
        }))
    }

    fn save_counter(&self, devotion: DevotionType, counter: &DevotionCounter) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO counters
                (devotion, today_count, total_cycles, last_reset_day, updated_at, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                devotion.key(),
                counter.today_count,
                counter.total_cycles,
                counter.last_reset_day.map(|d| d.format(DAY_FORMAT).to_string()),
                Utc::now().to_rfc3339(),
                self.device_id,
            ],
        )?;
        Ok(())
    }
}

impl SnapshotPersistence for Database {
    fn load_snapshot(&self) -> Result<Option<SuspendSnapshot>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT closed_at, speed_rpm, devotion FROM suspend_snapshot WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((closed_at, speed_at_close, devotion)) = row else {
            return Ok(None);
        };
        let closed_at: DateTime<FixedOffset> =
            DateTime::parse_from_rfc3339(&closed_at).map_err(|e| DatabaseError::InvalidData {
                key: "suspend_snapshot.closed_at".to_string(),
                message: e.to_string(),
            })?;
        Ok(Some(SuspendSnapshot {
            closed_at,
            speed_at_close,
            devotion_at_close: parse_devotion("suspend_snapshot.devotion", &devotion)?,
        }))
    }

    fn save_snapshot(&self, snapshot: &SuspendSnapshot) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO suspend_snapshot (id, closed_at, speed_rpm, devotion)
             VALUES (1, ?1, ?2, ?3)",
            params![
                snapshot.closed_at.to_rfc3339(),
                snapshot.speed_at_close,
                snapshot.devotion_at_close.key(),
            ],
        )?;
        Ok(())
    }

    fn clear_snapshot(&self) -> Result<(), DatabaseError> {
        self.conn.execute("DELETE FROM suspend_snapshot", [])?;
        Ok(())
    }
}

impl HistoryPersistence for Database {
    fn load_history(&self) -> Result<Vec<DailyHistoryRecord>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT devotion, day, cycles_completed FROM daily_history ORDER BY day")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (devotion, day, cycles_completed) = row?;
            records.push(DailyHistoryRecord {
                date: parse_day("daily_history.day", &day)?,
                devotion: parse_devotion("daily_history.devotion", &devotion)?,
                cycles_completed,
            });
        }
        Ok(records)
    }

    fn save_history(&self, records: &[DailyHistoryRecord]) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO daily_history (devotion, day, cycles_completed)
                 VALUES (?1, ?2, ?3)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.devotion.key(),
                    record.date.format(DAY_FORMAT).to_string(),
                    record.cycles_completed,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_history(&self, devotion: Option<DevotionType>) -> Result<(), DatabaseError> {
        match devotion {
            Some(devotion) => self
                .conn
                .execute("DELETE FROM daily_history WHERE devotion = ?1", params![devotion.key()])?,
            None => self.conn.execute("DELETE FROM daily_history", [])?,
        };
        Ok(())
    }
}

fn parse_day(key: &str, raw: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(raw, DAY_FORMAT).map_err(|e| DatabaseError::InvalidData {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_devotion(key: &str, raw: &str) -> Result<DevotionType, DatabaseError> {
    raw.parse::<DevotionType>().map_err(|e| DatabaseError::InvalidData {
        key: key.to_string(),
        message: e.to_string(),
    })
}
