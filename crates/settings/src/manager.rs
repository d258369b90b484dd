//! Typed access to the pending-update and failed-update records

use crate::kv::KeyValueStore;
use chrono::Utc;
use ota_errors::{DataError, Error};
use ota_types::{FailedUpdate, PackageRecord, PendingUpdate};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Key holding the single pending update record
pub const PENDING_UPDATE_KEY: &str = "ota.pending_update";

/// Key holding the ordered set of failed updates
pub const FAILED_UPDATES_KEY: &str = "ota.failed_updates";

/// Reads and writes lifecycle records through a [`KeyValueStore`].
///
/// Each method touches exactly one key; callers sequence multi-key changes.
#[derive(Debug)]
pub struct SettingsManager<S> {
    store: S,
}

impl<S: KeyValueStore> SettingsManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the pending update, if any
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be read and
    /// `DataError::MalformedData` if the payload does not parse.
    pub fn pending_update(&self) -> Result<Option<PendingUpdate>, Error> {
        self.read_json(PENDING_UPDATE_KEY)
    }

    /// Persist the pending update record
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub fn save_pending_update(&self, package_hash: &str, is_first_run: bool) -> Result<(), Error> {
        self.write_json(
            PENDING_UPDATE_KEY,
            &PendingUpdate::new(package_hash, is_first_run),
        )
    }

    /// Delete the pending update record; absent records are fine
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be updated.
    pub fn remove_pending_update(&self) -> Result<(), Error> {
        self.store.remove(PENDING_UPDATE_KEY)
    }

    /// Whether an update is waiting for its first run.
    ///
    /// A record already marked as first run is loading, not pending. With a
    /// hash, the record must also name that package.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::pending_update`].
    pub fn is_pending_update(&self, package_hash: Option<&str>) -> Result<bool, Error> {
        Ok(self.pending_update()?.is_some_and(|pending| {
            !pending.is_first_run && package_hash.is_none_or(|hash| pending.package_hash == hash)
        }))
    }

    /// Load the failed update set in insertion order
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be read and
    /// `DataError::MalformedData` if the payload does not parse.
    pub fn failed_updates(&self) -> Result<Vec<FailedUpdate>, Error> {
        Ok(self.read_json(FAILED_UPDATES_KEY)?.unwrap_or_default())
    }

    /// Append a package to the failed set unless its hash is already there.
    ///
    /// An unparseable set is replaced by a fresh one holding this entry.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be read or written.
    pub fn save_failed_update(&self, record: &PackageRecord) -> Result<(), Error> {
        let mut failed = match self.failed_updates() {
            Ok(failed) => failed,
            Err(Error::Data(DataError::MalformedData { .. })) => Vec::new(),
            Err(e) => return Err(e),
        };
        if failed
            .iter()
            .any(|entry| entry.package_hash == record.package_hash)
        {
            return Ok(());
        }
        failed.push(FailedUpdate::from_record(record, Utc::now()));
        self.write_json(FAILED_UPDATES_KEY, &failed)
    }

    /// Drop the whole failed set
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be updated.
    pub fn remove_failed_updates(&self) -> Result<(), Error> {
        self.store.remove(FAILED_UPDATES_KEY)
    }

    /// Whether a package hash previously failed to confirm
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::failed_updates`].
    pub fn is_failed_hash(&self, package_hash: &str) -> Result<bool, Error> {
        Ok(self
            .failed_updates()?
            .iter()
            .any(|entry| entry.package_hash == package_hash))
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DataError::malformed(key, e.to_string()).into())
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let payload = serde_json::to_vec(value)?;
        self.store.put(key, &payload)
    }
}
