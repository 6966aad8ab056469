// Device identity stamped on shared-store writes.
// Format: "prayerwheel-<uuid>"

use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

const DEVICE_ID_FILE: &str = "device_id";
const DEVICE_ID_PREFIX: &str = "prayerwheel-";

#[derive(Debug, thiserror::Error)]
pub enum DeviceIdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid device ID format: {0}")]
    InvalidFormat(String),
}

/// Read the device id stored in `dir`, creating one on first use.
pub fn get_or_create_device_id_at(dir: &Path) -> Result<String, DeviceIdError> {
    let path = dir.join(DEVICE_ID_FILE);

    if path.exists() {
        let device_id = fs::read_to_string(&path)?.trim().to_string();
        let valid = device_id
            .strip_prefix(DEVICE_ID_PREFIX)
            .is_some_and(|rest| Uuid::parse_str(rest).is_ok());
        return if valid {
            Ok(device_id)
        } else {
            Err(DeviceIdError::InvalidFormat(device_id))
        };
    }

    let device_id = format!("{DEVICE_ID_PREFIX}{}", Uuid::new_v4());
    fs::create_dir_all(dir)?;
    let mut file = fs::File::create(&path)?;
    writeln!(file, "{device_id}")?;
    Ok(device_id)
}

/// Device id from the default data directory.
pub fn get_or_create_device_id() -> Result<String, DeviceIdError> {
    let dir = crate::storage::data_dir().map_err(|e| match e {
        crate::error::DatabaseError::Io(io) => DeviceIdError::Io(io),
        other => DeviceIdError::Io(std::io::Error::other(other.to_string())),
    })?;
    get_or_create_device_id_at(&dir)
}
