//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Rotation speed and the devotion selected at startup
//! - Save debounce interval and the companion store location
//! - Offline compensation policy
//! - History summary preferences
//!
//! Configuration is stored at `~/.config/prayerwheel/config.toml`.

use chrono::{Duration, Weekday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::devotion::DevotionType;
use crate::error::ConfigError;
use crate::rotation::{RotationSpeed, DEFAULT_SPEED_RPM, MAX_SPEED_RPM, MIN_SPEED_RPM};

/// Wheel defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_speed_rpm")]
    pub speed_rpm: f64,
    #[serde(default)]
    pub devotion: DevotionType,
}

/// Where and how often counters are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Database file shared with a companion surface (widget, second device).
    /// Sync is a no-op when unset.
    #[serde(default)]
    pub shared_store_path: Option<PathBuf>,
}

/// Offline compensation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_offline_hours")]
    pub max_offline_hours: u64,
    #[serde(default = "default_true")]
    pub clear_snapshot_after_reconcile: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_week_start")]
    pub week_starts_on: Weekday,
    #[serde(default = "default_average_window_days")]
    pub average_window_days: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/prayerwheel/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub compensation: CompensationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Upper bound accepted by `chrono::Duration` constructors, in seconds.
const MAX_DURATION_SECS: u64 = (i64::MAX / 1000) as u64;

// Default functions
fn default_speed_rpm() -> f64 {
    DEFAULT_SPEED_RPM
}
fn default_flush_interval_secs() -> u64 {
    600
}
fn default_true() -> bool {
    true
}
fn default_max_offline_hours() -> u64 {
    24
}
fn default_week_start() -> Weekday {
    Weekday::Mon
}
fn default_average_window_days() -> u32 {
    30
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            speed_rpm: default_speed_rpm(),
            devotion: DevotionType::default(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            shared_store_path: None,
        }
    }
}

impl Default for CompensationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_offline_hours: default_max_offline_hours(),
            clear_snapshot_after_reconcile: true,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            week_starts_on: default_week_start(),
            average_window_days: default_average_window_days(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                    _ if value.is_empty() && part == "shared_store_path" => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default config file location.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing the defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Update a value in memory by dot-separated key.
    ///
    /// An empty value clears `persistence.shared_store_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rpm = self.rotation.speed_rpm;
        if !(MIN_SPEED_RPM..=MAX_SPEED_RPM).contains(&rpm) {
            return Err(ConfigError::InvalidValue {
                key: "rotation.speed_rpm".to_string(),
                message: format!("must be within [{MIN_SPEED_RPM}, {MAX_SPEED_RPM}]"),
            });
        }
        if self.persistence.flush_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "persistence.flush_interval_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.history.average_window_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "history.average_window_days".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn rotation_speed(&self) -> RotationSpeed {
        RotationSpeed::clamped(self.rotation.speed_rpm)
    }

    pub fn flush_interval(&self) -> Duration {
        let secs = self.persistence.flush_interval_secs.min(MAX_DURATION_SECS);
        Duration::seconds(secs as i64)
    }

    pub fn max_offline(&self) -> Duration {
        let hours = self.compensation.max_offline_hours.min(MAX_DURATION_SECS / 3600);
        Duration::hours(hours as i64)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.rotation.speed_rpm, 30.0);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[rotation]\nspeed_rpm = 60.0\n").unwrap();
        assert_eq!(parsed.rotation.speed_rpm, 60.0);
        assert_eq!(parsed.rotation.devotion, DevotionType::Amitabha);
        assert_eq!(parsed.persistence.flush_interval_secs, 600);
        assert!(parsed.compensation.clear_snapshot_after_reconcile);
        assert_eq!(parsed.history.week_starts_on, Weekday::Mon);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("compensation.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("compensation.max_offline_hours").as_deref(), Some("24"));
        assert_eq!(cfg.get("rotation.devotion").as_deref(), Some("amitabha"));
        assert!(cfg.get("rotation.missing_key").is_none());
        assert!(cfg.get("rotation").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("rotation.speed_rpm", "120").unwrap();
        cfg.apply("rotation.devotion", "heart_sutra").unwrap();
        cfg.apply("compensation.enabled", "false").unwrap();
        cfg.apply("history.week_starts_on", "Sun").unwrap();
        assert_eq!(cfg.rotation.speed_rpm, 120.0);
        assert_eq!(cfg.rotation.devotion, DevotionType::HeartSutra);
        assert!(!cfg.compensation.enabled);
        assert_eq!(cfg.history.week_starts_on, Weekday::Sun);
    }

    #[test]
    fn apply_sets_and_clears_shared_store_path() {
        let mut cfg = Config::default();
        cfg.apply("persistence.shared_store_path", "/tmp/shared.db").unwrap();
        assert_eq!(
            cfg.persistence.shared_store_path.as_deref(),
            Some(Path::new("/tmp/shared.db"))
        );
        cfg.apply("persistence.shared_store_path", "").unwrap();
        assert!(cfg.persistence.shared_store_path.is_none());
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.apply("rotation.nonexistent_key", "value").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
        assert!(cfg.apply("", "value").is_err());
    }

    #[test]
    fn apply_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.apply("compensation.enabled", "not_a_bool").is_err());
        assert!(cfg.apply("rotation.devotion", "unknown_sutra").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn apply_rejects_out_of_range_speed() {
        let mut cfg = Config::default();
        let err = cfg.apply("rotation.speed_rpm", "1000").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(cfg.rotation.speed_rpm, 30.0);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.apply("persistence.flush_interval_secs", "60").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().flush_interval(), Duration::seconds(60));
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rotation = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::LoadFailed { .. })));
    }

    #[test]
    fn durations_follow_settings() {
        let cfg = Config::default();
        assert_eq!(cfg.flush_interval(), Duration::minutes(10));
        assert_eq!(cfg.max_offline(), Duration::hours(24));
        assert_eq!(cfg.rotation_speed().rpm(), 30.0);
    }
}
