//! Devotion types: the partition key for every counter and history record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The prayer or mantra being recited on the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevotionType {
    /// 六字大明咒
    SixSyllableMantra,
    /// 心经
    HeartSutra,
    /// 南无阿弥陀佛
    Amitabha,
    /// 南无观世音菩萨
    Guanyin,
}

impl DevotionType {
    pub const ALL: [DevotionType; 4] = [
        DevotionType::SixSyllableMantra,
        DevotionType::HeartSutra,
        DevotionType::Amitabha,
        DevotionType::Guanyin,
    ];

    /// Stable ASCII key used for storage rows.
    pub fn key(&self) -> &'static str {
        match self {
            DevotionType::SixSyllableMantra => "six_syllable_mantra",
            DevotionType::HeartSutra => "heart_sutra",
            DevotionType::Amitabha => "amitabha",
            DevotionType::Guanyin => "guanyin",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DevotionType::SixSyllableMantra => "六字大明咒",
            DevotionType::HeartSutra => "心经",
            DevotionType::Amitabha => "南无阿弥陀佛",
            DevotionType::Guanyin => "南无观世音菩萨",
        }
    }
}

impl Default for DevotionType {
    fn default() -> Self {
        DevotionType::Amitabha
    }
}

impl fmt::Display for DevotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for DevotionType {
    type Err = ValidationError;

    /// Accepts either the storage key or the display name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DevotionType::ALL
            .into_iter()
            .find(|t| t.key() == s || t.display_name() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "devotion".to_string(),
                message: format!("unknown devotion type '{s}'"),
            })
    }
}
