//! Persistence seams for the counter components.
//!
//! [`Database`](super::Database) implements all of them; tests substitute
//! in-memory or failing stores.

use crate::compensation::SuspendSnapshot;
use crate::counter::DevotionCounter;
use crate::devotion::DevotionType;
use crate::error::DatabaseError;
use crate::history::DailyHistoryRecord;

/// Durable mirror of the per-devotion counters.
pub trait CounterPersistence {
    fn load_counter(&self, devotion: DevotionType) -> Result<Option<DevotionCounter>, DatabaseError>;

    fn save_counter(&self, devotion: DevotionType, counter: &DevotionCounter) -> Result<(), DatabaseError>;
}

/// Durable slot for the single active suspend snapshot.
pub trait SnapshotPersistence {
    fn load_snapshot(&self) -> Result<Option<SuspendSnapshot>, DatabaseError>;

    /// Overwrites any previous snapshot.
    fn save_snapshot(&self, snapshot: &SuspendSnapshot) -> Result<(), DatabaseError>;

    fn clear_snapshot(&self) -> Result<(), DatabaseError>;
}

/// Durable per-day history.
pub trait HistoryPersistence {
    fn load_history(&self) -> Result<Vec<DailyHistoryRecord>, DatabaseError>;

    /// Upsert each record by `(devotion, date)`.
    fn save_history(&self, records: &[DailyHistoryRecord]) -> Result<(), DatabaseError>;

    fn delete_history(&self, devotion: Option<DevotionType>) -> Result<(), DatabaseError>;
}

impl<T: CounterPersistence + ?Sized> CounterPersistence for &T {
    fn load_counter(&self, devotion: DevotionType) -> Result<Option<DevotionCounter>, DatabaseError> {
        (**self).load_counter(devotion)
    }

    fn save_counter(&self, devotion: DevotionType, counter: &DevotionCounter) -> Result<(), DatabaseError> {
        (**self).save_counter(devotion, counter)
    }
}

impl<T: SnapshotPersistence + ?Sized> SnapshotPersistence for &T {
    fn load_snapshot(&self) -> Result<Option<SuspendSnapshot>, DatabaseError> {
        (**self).load_snapshot()
    }

    fn save_snapshot(&self, snapshot: &SuspendSnapshot) -> Result<(), DatabaseError> {
        (**self).save_snapshot(snapshot)
    }

    fn clear_snapshot(&self) -> Result<(), DatabaseError> {
        (**self).clear_snapshot()
    }
}

impl<T: HistoryPersistence + ?Sized> HistoryPersistence for &T {
    fn load_history(&self) -> Result<Vec<DailyHistoryRecord>, DatabaseError> {
        (**self).load_history()
    }

    fn save_history(&self, records: &[DailyHistoryRecord]) -> Result<(), DatabaseError> {
        (**self).save_history(records)
    }

    fn delete_history(&self, devotion: Option<DevotionType>) -> Result<(), DatabaseError> {
        (**self).delete_history(devotion)
    }
}
