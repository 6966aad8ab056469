//! Lifetime and calendar-day counters per devotion type.

mod debounce;
mod store;

pub use debounce::SaveDebouncer;
pub use store::{DailyCounterStore, DevotionCounter};
