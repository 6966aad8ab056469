mod clock;
mod ticker;

pub use clock::{
    rotations_completed, RotationSpeed, DEFAULT_SPEED_RPM, MAX_SPEED_RPM, MIN_SPEED_RPM,
};
pub use ticker::{RotationTicker, TickerState};
