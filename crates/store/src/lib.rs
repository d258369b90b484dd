#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package storage for the ota update client
//!
//! This crate manages the packages directory where installed updates live,
//! one directory per package hash:
//!
//! ```text
//! <root>/
//!   slots.json            {"currentPackage": ..., "previousPackage": ...}
//!   <hash>/package.json   metadata record for the package
//!   <hash>/...            package files (bundle, assets)
//!   staging-*/            in-flight installs, removed on open
//! ```
//!
//! Package files are always durable before `slots.json` points at them, so
//! an interrupted install leaves the slots exactly as they were.

mod slots;

use ota_errors::{DataError, Error, StorageError};
use ota_platform::fs;
use ota_types::PackageRecord;
use slots::{SlotMetadata, SLOTS_FILENAME};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the metadata record inside each package directory
pub const PACKAGE_METADATA_FILENAME: &str = "package.json";

const STAGING_PREFIX: &str = "staging-";

/// Store manager for installed update packages
#[derive(Debug)]
pub struct PackageStore {
    root: PathBuf,
    slots: SlotMetadata,
}

impl PackageStore {
    /// Open the store at `root`, creating it if needed.
    ///
    /// Leftover staging directories and package directories referenced by
    /// neither slot are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or scanned, or if
    /// `slots.json` exists but does not parse.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let slots = SlotMetadata::load(&root.join(SLOTS_FILENAME))?;
        let store = Self { root, slots };
        store.collect_garbage()?;
        Ok(store)
    }

    /// Root directory of the store
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hash of the package in the current slot
    #[must_use]
    pub fn current_package_hash(&self) -> Option<&str> {
        self.slots.current_package.as_deref()
    }

    /// Hash of the package in the previous slot
    #[must_use]
    pub fn previous_package_hash(&self) -> Option<&str> {
        self.slots.previous_package.as_deref()
    }

    /// Directory holding a package's files
    #[must_use]
    pub fn package_folder_path(&self, hash: &str) -> PathBuf {
        self.root.join(hash)
    }

    /// Metadata record of the current package
    ///
    /// # Errors
    ///
    /// Returns an error if the slot names a package whose record is missing
    /// or unreadable.
    pub fn current_package(&self) -> Result<Option<PackageRecord>, Error> {
        match self.slots.current_package.as_deref() {
            Some(hash) => self.require_package(hash).map(Some),
            None => Ok(None),
        }
    }

    /// Metadata record of the previous package
    ///
    /// # Errors
    ///
    /// Returns an error if the slot names a package whose record is missing
    /// or unreadable.
    pub fn previous_package(&self) -> Result<Option<PackageRecord>, Error> {
        match self.slots.previous_package.as_deref() {
            Some(hash) => self.require_package(hash).map(Some),
            None => Ok(None),
        }
    }

    /// Metadata record of any stored package
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or parsed.
    pub fn package(&self, hash: &str) -> Result<Option<PackageRecord>, Error> {
        validate_hash(hash)?;
        let path = self
            .package_folder_path(hash)
            .join(PACKAGE_METADATA_FILENAME);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::from_io_with_path(&e, &path).into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DataError::malformed(path.display().to_string(), e.to_string()).into())
    }

    /// Absolute path of the current package's bundle.
    ///
    /// The record's own `bundle_path` wins; otherwise `bundle_file_name` is
    /// looked up at the top of the package directory.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::current_package`].
    pub fn current_package_bundle_path(
        &self,
        bundle_file_name: &str,
    ) -> Result<Option<PathBuf>, Error> {
        let Some(record) = self.current_package()? else {
            return Ok(None);
        };
        let relative = record.bundle_path.as_deref().unwrap_or(bundle_file_name);
        Ok(Some(
            self.package_folder_path(&record.package_hash).join(relative),
        ))
    }

    /// Install a package from `files_dir` and promote it to the current slot.
    ///
    /// The files and metadata are staged and synced, the staging directory is
    /// renamed into place, and only then is `slots.json` rewritten with the
    /// old current package as previous. The superseded previous package is
    /// deleted afterwards. Installing the current package again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if staging or promotion fails; the slots are
    /// unchanged in that case.
    pub fn install_package(&mut self, record: &PackageRecord, files_dir: &Path) -> Result<(), Error> {
        let hash = record.package_hash.as_str();
        validate_hash(hash)?;
        if self.current_package_hash() == Some(hash) {
            return Ok(());
        }

        let target = self.package_folder_path(hash);
        if !fs::exists(&target) {
            self.stage(record, files_dir, &target)?;
        }

        let superseded = self.slots.previous_package.clone();
        let next = SlotMetadata {
            current_package: Some(hash.to_string()),
            previous_package: self.slots.current_package.clone(),
        };
        self.commit_slots(next)?;

        if let Some(old) = superseded {
            self.prune(&old);
        }
        Ok(())
    }

    /// Make the previous package current again and delete the current one.
    ///
    /// Without a previous package this succeeds and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if `slots.json` cannot be rewritten. The failed
    /// package directory is removed on a best-effort basis.
    pub fn rollback_package(&mut self) -> Result<(), Error> {
        let Some(previous) = self.slots.previous_package.clone() else {
            return Ok(());
        };
        let failed = self.slots.current_package.clone();
        self.commit_slots(SlotMetadata {
            current_package: Some(previous),
            previous_package: None,
        })?;

        if let Some(failed) = failed {
            self.prune(&failed);
        }
        Ok(())
    }

    /// Drop the current package, leaving the previous slot as it is
    ///
    /// # Errors
    ///
    /// Returns an error if `slots.json` cannot be rewritten.
    pub fn discard_current(&mut self) -> Result<(), Error> {
        let Some(current) = self.slots.current_package.clone() else {
            return Ok(());
        };
        self.commit_slots(SlotMetadata {
            current_package: None,
            previous_package: self.slots.previous_package.clone(),
        })?;
        self.prune(&current);
        Ok(())
    }

    /// Delete every package and the slot record. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be emptied.
    pub fn clear_all(&mut self) -> Result<(), Error> {
        fs::remove_dir_all(&self.root)?;
        self.slots = SlotMetadata::default();
        fs::create_dir_all(&self.root)?;
        if let Some(parent) = self.root.parent() {
            fs::fsync_dir(parent)?;
        }
        Ok(())
    }

    fn require_package(&self, hash: &str) -> Result<PackageRecord, Error> {
        self.package(hash)?.ok_or_else(|| {
            StorageError::PackageNotFound {
                hash: hash.to_string(),
            }
            .into()
        })
    }

    fn stage(&self, record: &PackageRecord, files_dir: &Path, target: &Path) -> Result<(), Error> {
        let staging_failed = |message: String| -> Error {
            StorageError::StagingFailed {
                hash: record.package_hash.clone(),
                message,
            }
            .into()
        };

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| staging_failed(e.to_string()))?;

        // Until `keep`, an early return drops the guard and the staging dir.
        fs::copy_directory(files_dir, staging.path())?;
        let metadata = serde_json::to_vec_pretty(record)?;
        fs::write_atomic(&staging.path().join(PACKAGE_METADATA_FILENAME), &metadata)?;

        let staged = staging.keep();
        if let Err(e) = fs::atomic_rename(&staged, target) {
            let _ = fs::remove_dir_all(&staged);
            return Err(e);
        }
        Ok(())
    }

    fn commit_slots(&mut self, next: SlotMetadata) -> Result<(), Error> {
        next.persist(&self.root.join(SLOTS_FILENAME))?;
        self.slots = next;
        Ok(())
    }

    /// Delete a package directory the slots no longer reference.
    ///
    /// Runs after the slots are committed, so a failure only leaves an orphan
    /// behind for the next `open` to collect.
    fn prune(&self, hash: &str) {
        if self.slots.references(hash) {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.package_folder_path(hash)) {
            tracing::warn!(
                package_hash = hash,
                error = %e,
                "failed to remove unreferenced package directory"
            );
        }
    }

    fn collect_garbage(&self) -> Result<(), Error> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| StorageError::from_io_with_path(&e, &self.root))?;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::from_io_with_path(&e, &self.root))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if path.is_dir() {
                if name.starts_with(STAGING_PREFIX) || !self.slots.references(&name) {
                    fs::remove_dir_all(&path)?;
                }
            } else if name.starts_with(".tmp") {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Reject hashes that would escape the store or collide with its own files
fn validate_hash(hash: &str) -> Result<(), Error> {
    let invalid = hash.is_empty()
        || hash.starts_with('.')
        || hash.starts_with(STAGING_PREFIX)
        || hash == SLOTS_FILENAME
        || hash.contains(['/', '\\']);
    if invalid {
        return Err(StorageError::InvalidPath {
            path: hash.to_string(),
        }
        .into());
    }
    Ok(())
}
