//! Counter sync between the local store and the companion-device store.
//!
//! Both stores are written independently; they converge by taking the
//! maximum of each counter field, so merges commute and can be repeated.

pub mod device_id;
mod merger;

pub use device_id::{get_or_create_device_id, get_or_create_device_id_at, DeviceIdError};
pub use merger::{merge, SyncMerger, SyncReport};
