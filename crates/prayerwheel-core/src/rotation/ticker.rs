//! Rotation ticker.
//!
//! A wall-clock state machine with no internal thread: the caller invokes
//! `tick()` periodically and receives the number of whole rotations that
//! completed since the previous tick. Fractional progress is carried over
//! so no partial rotation is ever reported or lost.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Spinning <-> Paused
//! ```

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::clock::RotationSpeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerState {
    Idle,
    Spinning,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationTicker {
    speed: RotationSpeed,
    state: TickerState,
    /// Wall-clock instant of the last flush while spinning.
    #[serde(default)]
    last_tick: Option<DateTime<FixedOffset>>,
    /// Progress toward the next whole rotation, in `[0, 1)`.
    #[serde(default)]
    progress: f64,
}

impl RotationTicker {
    pub fn new(speed: RotationSpeed) -> Self {
        Self {
            speed,
            state: TickerState::Idle,
            last_tick: None,
            progress: 0.0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TickerState {
        self.state
    }

    pub fn speed(&self) -> RotationSpeed {
        self.speed
    }

    /// 0.0 .. 1.0 progress within the current rotation.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Wheel angle in degrees for the current partial rotation.
    pub fn angle_degrees(&self) -> f64 {
        self.progress * 360.0
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin or continue spinning. Returns false if already spinning.
    pub fn start(&mut self, now: DateTime<FixedOffset>) -> bool {
        if self.state == TickerState::Spinning {
            return false;
        }
        self.state = TickerState::Spinning;
        self.last_tick = Some(now);
        true
    }

    /// Stop spinning, returning the whole rotations completed up to `now`.
    pub fn pause(&mut self, now: DateTime<FixedOffset>) -> u64 {
        if self.state != TickerState::Spinning {
            return 0;
        }
        let completed = self.flush_elapsed(now);
        self.state = TickerState::Paused;
        self.last_tick = None;
        completed
    }

    /// Call periodically. Returns the whole rotations completed since the
    /// previous tick.
    pub fn tick(&mut self, now: DateTime<FixedOffset>) -> u64 {
        match self.state {
            TickerState::Spinning => self.flush_elapsed(now),
            _ => 0,
        }
    }

    /// Change speed. Progress accumulated so far is settled at the old
    /// speed; the returned rotations completed before the change.
    pub fn set_speed(&mut self, speed: RotationSpeed, now: DateTime<FixedOffset>) -> u64 {
        let completed = self.tick(now);
        self.speed = speed;
        completed
    }

    /// Move a spinning ticker's anchor to `now` without counting the time in
    /// between. Returns the previous anchor, or `None` when not spinning.
    pub fn reanchor(&mut self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        if self.state != TickerState::Spinning {
            return None;
        }
        self.last_tick.replace(now)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush_elapsed(&mut self, now: DateTime<FixedOffset>) -> u64 {
        let Some(last) = self.last_tick else {
            return 0;
        };
        // A clock that moved backwards contributes no progress.
        let elapsed_ms = now.signed_duration_since(last).num_milliseconds().max(0);
        let elapsed_secs = elapsed_ms as f64 / 1000.0;
        let total = self.progress + elapsed_secs / self.speed.period_secs();
        let whole = total.floor();
        self.progress = total - whole;
        self.last_tick = Some(now.max(last));
        whole as u64
    }
}

impl Default for RotationTicker {
    fn default() -> Self {
        Self::new(RotationSpeed::default())
    }
}
