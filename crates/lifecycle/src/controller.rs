//! The update lifecycle state machine.
//!
//! The controller owns every transition between "running the binary",
//! "running an unconfirmed package" and "running a confirmed package". The
//! states themselves are never stored: they follow from the pending record in
//! the settings store and the current slot of the package store.
//!
//! Crash recovery hinges on one ordering rule. Before control is handed to a
//! freshly installed package, its pending record is rewritten with
//! `is_first_run = true`. If the package confirms itself the record is
//! removed; if the process dies first, the next launch still finds the flag
//! set and rolls the package back.

use crate::options::LifecycleOptions;
use ota_config::Config;
use ota_errors::{DataError, Error, LifecycleError, UserFacingError};
use ota_events::{EventEmitter, EventSender, FailureContext, LifecycleEvent};
use ota_platform::{AppVersionOverride, BinaryIdentitySource, BuildInfoFile};
use ota_settings::{FileKeyValueStore, KeyValueStore, SettingsManager};
use ota_store::PackageStore;
use ota_types::{
    BinaryIdentity, BootTarget, FailedUpdate, LifecycleStatus, PackageRecord, PendingUpdate,
};
use std::path::Path;

/// Outcome of a launch-time resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Bundle the host should load
    pub target: BootTarget,
    /// A package is running for the first time on this launch
    pub did_update: bool,
    /// An unconfirmed package was rolled back on this launch
    pub rolled_back: bool,
}

/// What the pending-record check decided before a bundle is picked
#[derive(Debug, Default)]
struct AfterRestart {
    did_update: bool,
    rolled_back: bool,
}

/// Lifecycle state machine over the package store and the settings store
pub struct LifecycleController {
    store: PackageStore,
    settings: SettingsManager<Box<dyn KeyValueStore>>,
    oracle: Box<dyn BinaryIdentitySource>,
    options: LifecycleOptions,
    events: Option<EventSender>,
}

impl EventEmitter for LifecycleController {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    pub fn new(
        store: PackageStore,
        settings: SettingsManager<Box<dyn KeyValueStore>>,
        oracle: Box<dyn BinaryIdentitySource>,
        options: LifecycleOptions,
    ) -> Self {
        Self {
            store,
            settings,
            oracle,
            options,
            events: None,
        }
    }

    /// Build a controller over the directories and files named by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the settings or package directories cannot be
    /// opened.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let kv: Box<dyn KeyValueStore> = Box::new(FileKeyValueStore::open(config.settings_path())?);
        let store = PackageStore::open(config.packages_path())?;

        let build_info = BuildInfoFile::new(config.build_info_path());
        let oracle: Box<dyn BinaryIdentitySource> = match &config.binary.app_version_override {
            Some(version) => Box::new(AppVersionOverride::new(build_info, version.clone())),
            None => Box::new(build_info),
        };

        Ok(Self::new(
            store,
            SettingsManager::new(kv),
            oracle,
            LifecycleOptions::from_config(config),
        ))
    }

    /// Attach an event sender
    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn options(&self) -> &LifecycleOptions {
        &self.options
    }

    /// Decide which bundle this launch runs, rolling back if needed.
    ///
    /// Storage failures fall back to the binary bundle. Only fatal errors
    /// are returned: unreadable binary metadata, or a rollback that could
    /// not restore a bootable state.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` or `LifecycleError::UnrecoverableStorage`.
    pub fn resolve(&mut self, bundle_file_name: &str) -> Result<Resolution, Error> {
        let binary = self.oracle.current_binary_identity()?;
        let fallback = BootTarget::Binary {
            path: self.options.binary_bundle_path(bundle_file_name),
        };

        let after_restart = match self.initialize_after_restart(&binary) {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.storage_fallback("initialize_after_restart", &e);
                return Ok(self.resolved(fallback, AfterRestart::default()));
            }
        };

        match self.select_bundle(bundle_file_name, &binary) {
            Ok(Some(target)) => Ok(self.resolved(target, after_restart)),
            Ok(None) => Ok(self.resolved(
                fallback,
                AfterRestart {
                    did_update: false,
                    ..after_restart
                },
            )),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.storage_fallback("select_bundle", &e);
                Ok(self.resolved(
                    fallback,
                    AfterRestart {
                        did_update: false,
                        ..after_restart
                    },
                ))
            }
        }
    }

    /// Disarm the crash trap for the running package. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the pending record cannot be removed.
    pub fn confirm_ready(&mut self) -> Result<(), Error> {
        self.settings.remove_pending_update()?;
        self.emit_lifecycle(LifecycleEvent::UpdateConfirmed {
            package_hash: self.store.current_package_hash().map(ToOwned::to_owned),
        });
        Ok(())
    }

    /// Drop every package together with the pending and failed records
    ///
    /// # Errors
    ///
    /// Returns a storage error if any part of the state cannot be removed.
    pub fn discard_all_updates(&mut self) -> Result<(), Error> {
        self.clear_updates("discard requested")
    }

    /// Install a downloaded package and make it the next boot candidate.
    ///
    /// A record without a build timestamp is stamped with the running
    /// binary's identity. The pending record is written before promotion so
    /// that an interrupted install is recognisable at the next launch.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the binary identity is unavailable and a
    /// `StorageError` if the install fails; the pending record is withdrawn
    /// in that case.
    pub fn install_update(
        &mut self,
        record: &PackageRecord,
        files_dir: &Path,
    ) -> Result<PackageRecord, Error> {
        let record = if record.binary_modified_time.is_some() {
            record.clone()
        } else {
            record.stamped_with(&self.oracle.current_binary_identity()?)
        };

        self.settings
            .save_pending_update(&record.package_hash, false)?;
        let previous_hash = self.store.current_package_hash().map(ToOwned::to_owned);

        if let Err(e) = self.store.install_package(&record, files_dir) {
            if let Err(cleanup) = self.settings.remove_pending_update() {
                // Left behind, it names a non-current hash and is dropped at launch
                self.emit_warning(
                    "could not withdraw pending update after failed install",
                    cleanup.to_string(),
                );
            }
            return Err(e);
        }

        self.emit_lifecycle(LifecycleEvent::PackageInstalled {
            package_hash: record.package_hash.clone(),
            label: record.label.clone(),
            previous_hash,
        });
        Ok(record)
    }

    /// Delete the host's cached development bundle when an update is waiting.
    ///
    /// Only applies in development mode; otherwise the cached bundle would
    /// shadow the freshly installed package. Returns whether a file was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the pending record or the cache file cannot
    /// be accessed.
    pub fn clear_debug_cache_if_needed(&self) -> Result<bool, Error> {
        if !self.options.development_mode || !self.settings.is_pending_update(None)? {
            return Ok(false);
        }
        let Some(path) = self.options.dev_bundle_cache_path.as_deref() else {
            return Ok(false);
        };
        let removed = ota_platform::fs::remove_file(path)?;
        if removed {
            self.emit_lifecycle(LifecycleEvent::DebugCacheCleared {
                path: path.to_path_buf(),
            });
        }
        Ok(removed)
    }

    /// Metadata of the package in the current slot
    ///
    /// # Errors
    ///
    /// Returns an error if the package record cannot be read.
    pub fn current_package(&self) -> Result<Option<PackageRecord>, Error> {
        self.store.current_package()
    }

    /// Metadata of the package in the previous slot
    ///
    /// # Errors
    ///
    /// Returns an error if the package record cannot be read.
    pub fn previous_package(&self) -> Result<Option<PackageRecord>, Error> {
        self.store.previous_package()
    }

    /// The pending update record, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or parsed.
    pub fn pending_update(&self) -> Result<Option<PendingUpdate>, Error> {
        self.settings.pending_update()
    }

    /// Updates that failed to confirm, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the failed set cannot be read or parsed.
    pub fn failed_updates(&self) -> Result<Vec<FailedUpdate>, Error> {
        self.settings.failed_updates()
    }

    /// Whether a package previously failed to confirm itself
    ///
    /// # Errors
    ///
    /// Returns an error if the failed set cannot be read.
    pub fn is_failed_update(&self, package_hash: &str) -> Result<bool, Error> {
        self.settings.is_failed_hash(package_hash)
    }

    /// Whether an installed update is waiting for its first run
    ///
    /// # Errors
    ///
    /// Returns an error if the pending record cannot be read.
    pub fn is_pending_update(&self, package_hash: Option<&str>) -> Result<bool, Error> {
        self.settings.is_pending_update(package_hash)
    }

    /// Identity of the running binary
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the build metadata is unavailable.
    pub fn binary_identity(&self) -> Result<BinaryIdentity, Error> {
        self.oracle.current_binary_identity()
    }

    /// Derive the lifecycle state from the launch outcome and the pending record
    ///
    /// # Errors
    ///
    /// Returns an error if the pending record cannot be read.
    pub fn status(&self, running_binary: bool) -> Result<LifecycleStatus, Error> {
        if running_binary {
            return Ok(LifecycleStatus::RunningBinary);
        }
        let unconfirmed = self
            .settings
            .pending_update()?
            .is_some_and(|pending| {
                pending.is_first_run
                    && self.store.current_package_hash() == Some(pending.package_hash.as_str())
            });
        Ok(if unconfirmed {
            LifecycleStatus::RunningUnconfirmedPackage
        } else {
            LifecycleStatus::RunningConfirmedPackage
        })
    }

    fn initialize_after_restart(&mut self, binary: &BinaryIdentity) -> Result<AfterRestart, Error> {
        let Some(pending) = self.read_pending()? else {
            return Ok(AfterRestart::default());
        };

        let current = match self.store.current_package()? {
            Some(record) if record.package_hash == pending.package_hash => record,
            _ => {
                // The install never reached promotion
                self.settings.remove_pending_update()?;
                self.emit_warning(
                    "discarded pending update for a package that is not current",
                    pending.package_hash,
                );
                return Ok(AfterRestart::default());
            }
        };

        if !current.is_latest_for(binary, self.options.test_configuration)
            && current.binary_version_changed(binary)
        {
            self.emit_lifecycle(LifecycleEvent::StalePackageIgnored {
                package_hash: current.package_hash.clone(),
                recorded_version: current.app_version.clone(),
                binary_version: binary.app_version.clone(),
            });
            return Ok(AfterRestart::default());
        }

        if pending.is_first_run {
            self.rollback(&current)?;
            return Ok(AfterRestart {
                did_update: false,
                rolled_back: true,
            });
        }

        self.settings
            .save_pending_update(&pending.package_hash, true)?;
        self.emit_lifecycle(LifecycleEvent::UpdateArmed {
            package_hash: pending.package_hash,
        });
        Ok(AfterRestart {
            did_update: true,
            rolled_back: false,
        })
    }

    /// Read the pending record, treating an unparseable one as absent.
    ///
    /// The corrupt payload stays in place for inspection; the next confirm,
    /// install or clear replaces it.
    fn read_pending(&self) -> Result<Option<PendingUpdate>, Error> {
        match self.settings.pending_update() {
            Ok(pending) => Ok(pending),
            Err(Error::Data(DataError::MalformedData { key, message })) => {
                tracing::error!(
                    key = key.as_str(),
                    message = message.as_str(),
                    "ignoring malformed pending update record"
                );
                self.emit_lifecycle(LifecycleEvent::MalformedRecord { key, message });
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Restore the previous package after the current one failed to confirm.
    ///
    /// Only a failure to move the slots is fatal. A failed-set write error
    /// leaves the pending record armed for the next launch to retry.
    fn rollback(&mut self, failed: &PackageRecord) -> Result<(), Error> {
        self.settings.save_failed_update(failed)?;

        let restored = if self.store.previous_package_hash().is_some() {
            self.store.rollback_package()
        } else {
            self.store.discard_current()
        };
        restored.map_err(|e| {
            Error::from(LifecycleError::UnrecoverableStorage {
                hash: failed.package_hash.clone(),
                message: e.user_message().into_owned(),
            })
        })?;

        if let Err(e) = self.settings.remove_pending_update() {
            // Names a hash that is no longer current; dropped at the next launch
            tracing::warn!(
                package_hash = failed.package_hash.as_str(),
                error = %e,
                "could not remove pending update after rollback"
            );
            self.emit_warning(
                "could not remove pending update after rollback",
                e.to_string(),
            );
        }

        self.emit_lifecycle(LifecycleEvent::RollbackPerformed {
            failed_hash: failed.package_hash.clone(),
            restored_hash: self.store.current_package_hash().map(ToOwned::to_owned),
        });
        Ok(())
    }

    /// Pick the package bundle if the current package matches this binary.
    ///
    /// `None` means the binary bundle. An outdated package is purged unless
    /// development mode keeps it around for an unchanged binary version. A
    /// record whose build timestamp does not parse counts as outdated and is
    /// reported before it goes.
    fn select_bundle(
        &mut self,
        bundle_file_name: &str,
        binary: &BinaryIdentity,
    ) -> Result<Option<BootTarget>, Error> {
        let Some(record) = self.store.current_package()? else {
            return Ok(None);
        };

        if record.is_latest_for(binary, self.options.test_configuration) {
            let path = self
                .store
                .current_package_bundle_path(bundle_file_name)?
                .ok_or_else(|| Error::internal("current package vanished during resolve"))?;
            return Ok(Some(BootTarget::Package {
                path,
                package_hash: record.package_hash,
            }));
        }

        if let Err(e) = record.parsed_binary_modified_time() {
            let message = format!("package {}: {e}", record.package_hash);
            tracing::error!(
                package_hash = record.package_hash.as_str(),
                error = %e,
                "package record has an unparseable binaryModifiedTime"
            );
            self.emit_lifecycle(LifecycleEvent::MalformedRecord {
                key: "binaryModifiedTime".to_string(),
                message,
            });
        }

        if !self.options.development_mode || record.binary_version_changed(binary) {
            self.clear_updates("binary changed since the package was installed")?;
        }
        Ok(None)
    }

    fn clear_updates(&mut self, reason: &str) -> Result<(), Error> {
        self.store.clear_all()?;
        self.settings.remove_pending_update()?;
        self.settings.remove_failed_updates()?;
        self.emit_lifecycle(LifecycleEvent::UpdatesDiscarded {
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn resolved(&self, target: BootTarget, outcome: AfterRestart) -> Resolution {
        self.emit_lifecycle(LifecycleEvent::BootTargetResolved {
            path: target.path().to_path_buf(),
            package_hash: target.package_hash().map(ToOwned::to_owned),
            running_binary: target.is_binary(),
        });
        Resolution {
            target,
            did_update: outcome.did_update,
            rolled_back: outcome.rolled_back,
        }
    }

    fn storage_fallback(&self, operation: &str, error: &Error) {
        tracing::warn!(operation, error = %error, "storage failure, falling back");
        self.emit_lifecycle(LifecycleEvent::StorageFallback {
            operation: operation.to_string(),
            failure: FailureContext::from_error(error),
        });
    }
}
