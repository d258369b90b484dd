//! Current/previous slot bookkeeping persisted as `slots.json`.

use ota_errors::{DataError, Error, StorageError};
use ota_platform::fs;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

pub(crate) const SLOTS_FILENAME: &str = "slots.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SlotMetadata {
    #[serde(default)]
    pub current_package: Option<String>,
    #[serde(default)]
    pub previous_package: Option<String>,
}

impl SlotMetadata {
    /// Whether a package directory is referenced by either slot
    pub fn references(&self, hash: &str) -> bool {
        self.current_package.as_deref() == Some(hash)
            || self.previous_package.as_deref() == Some(hash)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(StorageError::from_io_with_path(&e, path).into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| DataError::malformed(SLOTS_FILENAME, e.to_string()).into())
    }

    pub fn persist(&self, path: &Path) -> Result<(), Error> {
        let payload = serde_json::to_vec_pretty(self)?;
        fs::write_atomic(path, &payload)
    }
}
