//! Rotation arithmetic.
//!
//! Converts elapsed wall-clock time and a rotation speed into a count of
//! whole rotations. Callers are responsible for bounding the speed; see
//! [`RotationSpeed`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MIN_SPEED_RPM: f64 = 6.0;
pub const MAX_SPEED_RPM: f64 = 600.0;
pub const DEFAULT_SPEED_RPM: f64 = 30.0;

/// Number of whole rotations completed in `elapsed_secs` at `speed_rpm`.
///
/// `floor(elapsed_secs * speed_rpm / 60)`. Speed is not clamped here.
/// Non-positive or non-finite inputs complete no rotations.
pub fn rotations_completed(elapsed_secs: f64, speed_rpm: f64) -> u64 {
    if !(elapsed_secs > 0.0 && speed_rpm > 0.0) {
        return 0;
    }
    let rotations = (elapsed_secs * speed_rpm / 60.0).floor();
    if rotations.is_finite() {
        rotations as u64
    } else {
        u64::MAX
    }
}

/// Rotation speed in rotations per minute, always within
/// [`MIN_SPEED_RPM`, `MAX_SPEED_RPM`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RotationSpeed(f64);

impl RotationSpeed {
    /// Validate a speed, rejecting anything outside the supported range.
    pub fn new(rpm: f64) -> Result<Self, ValidationError> {
        if rpm.is_finite() && (MIN_SPEED_RPM..=MAX_SPEED_RPM).contains(&rpm) {
            Ok(Self(rpm))
        } else {
            Err(ValidationError::InvalidSpeed {
                rpm,
                min: MIN_SPEED_RPM,
                max: MAX_SPEED_RPM,
            })
        }
    }

    /// Clamp into the supported range. Non-finite input falls back to the default.
    pub fn clamped(rpm: f64) -> Self {
        if rpm.is_finite() {
            Self(rpm.clamp(MIN_SPEED_RPM, MAX_SPEED_RPM))
        } else {
            Self::default()
        }
    }

    pub fn rpm(&self) -> f64 {
        self.0
    }

    /// Seconds for one full rotation.
    pub fn period_secs(&self) -> f64 {
        60.0 / self.0
    }

    pub fn rotations_in(&self, elapsed_secs: f64) -> u64 {
        rotations_completed(elapsed_secs, self.0)
    }
}

impl Default for RotationSpeed {
    fn default() -> Self {
        Self(DEFAULT_SPEED_RPM)
    }
}

impl TryFrom<f64> for RotationSpeed {
    type Error = ValidationError;

    fn try_from(rpm: f64) -> Result<Self, Self::Error> {
        Self::new(rpm)
    }
}

impl From<RotationSpeed> for f64 {
    fn from(speed: RotationSpeed) -> Self {
        speed.0
    }
}
