use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::counter::DevotionCounter;
use crate::devotion::DevotionType;

/// Every state change of a wheel session produces an Event.
/// Front ends drain them to refresh displays; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    RotationCompleted {
        devotion: DevotionType,
        today_count: u64,
        total_cycles: u64,
        at: DateTime<FixedOffset>,
    },
    /// First access on a new calendar day zeroed the today-count.
    DailyReset {
        devotion: DevotionType,
        at: DateTime<FixedOffset>,
    },
    /// Rotations credited for time spent suspended.
    RotationsCompensated {
        devotion: DevotionType,
        rotations: u64,
        offline_secs: i64,
        capped: bool,
        at: DateTime<FixedOffset>,
    },
    CounterReset {
        devotion: DevotionType,
        at: DateTime<FixedOffset>,
    },
    CountersMerged {
        devotion: DevotionType,
        merged: DevotionCounter,
        local_updated: bool,
        shared_updated: bool,
        at: DateTime<FixedOffset>,
    },
    SessionSuspended {
        devotion: DevotionType,
        speed_rpm: f64,
        at: DateTime<FixedOffset>,
    },
    SessionResumed {
        at: DateTime<FixedOffset>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<FixedOffset> {
        match self {
            Event::RotationCompleted { at, .. }
            | Event::DailyReset { at, .. }
            | Event::RotationsCompensated { at, .. }
            | Event::CounterReset { at, .. }
            | Event::CountersMerged { at, .. }
            | Event::SessionSuspended { at, .. }
            | Event::SessionResumed { at } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_with_type_tag() {
        let at = FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 11, 10, 8, 0, 0)
            .unwrap();
        let event = Event::DailyReset {
            devotion: DevotionType::HeartSutra,
            at,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DailyReset");
        assert_eq!(json["devotion"], "heart_sutra");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back.at(), at);
    }
}
