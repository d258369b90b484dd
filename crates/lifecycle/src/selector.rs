//! Entry point for the host runtime.
//!
//! The host asks the selector for a bundle path once per launch and the
//! application calls [`BundleSelector::confirm_ready`] once it started
//! successfully. All operations are blocking and serialized through one
//! mutex, so the selector can be shared between threads behind an `Arc`.

use crate::controller::{LifecycleController, Resolution};
use ota_config::Config;
use ota_errors::Error;
use ota_events::EventSender;
use ota_types::{BootTarget, FailedUpdate, LifecycleStatus, PackageRecord, PendingUpdate};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-process launch facts, reset on every process start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchState {
    pub running_binary: bool,
    pub need_to_report_rollback: bool,
    pub did_update: bool,
    pub assets_bundle_file_name: String,
}

impl LaunchState {
    fn new(assets_bundle_file_name: String) -> Self {
        Self {
            running_binary: true,
            need_to_report_rollback: false,
            did_update: false,
            assets_bundle_file_name,
        }
    }

    fn apply(&mut self, resolution: &Resolution) {
        self.running_binary = resolution.target.is_binary();
        self.did_update = resolution.did_update;
        if resolution.rolled_back {
            self.need_to_report_rollback = true;
        }
    }
}

struct Inner {
    controller: LifecycleController,
    launch: LaunchState,
}

/// Thread-safe facade over the lifecycle controller
pub struct BundleSelector {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for BundleSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("BundleSelector")
            .field("controller", &inner.controller)
            .field("launch", &inner.launch)
            .finish()
    }
}

impl BundleSelector {
    #[must_use]
    pub fn new(controller: LifecycleController) -> Self {
        let launch = LaunchState::new(controller.options().bundle_file_name.clone());
        Self {
            inner: Mutex::new(Inner { controller, launch }),
        }
    }

    /// Build a selector from configuration, optionally wired to an event channel
    ///
    /// # Errors
    ///
    /// Returns an error if the controller cannot be built.
    pub fn from_config(config: &Config, events: Option<EventSender>) -> Result<Self, Error> {
        let controller = LifecycleController::from_config(config)?;
        let controller = match events {
            Some(events) => controller.with_events(events),
            None => controller,
        };
        Ok(Self::new(controller))
    }

    // The persisted records are authoritative, so a panic in another
    // thread leaves nothing in memory worth refusing to read.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the boot target for the configured bundle file name
    ///
    /// # Errors
    ///
    /// Returns only fatal errors; see [`LifecycleController::resolve`].
    pub fn resolve_boot_target(&self) -> Result<BootTarget, Error> {
        let mut inner = self.lock();
        let bundle = inner.controller.options().bundle_file_name.clone();
        Self::resolve_locked(&mut inner, bundle)
    }

    /// Resolve the boot target for a specific embedded bundle file name
    ///
    /// # Errors
    ///
    /// Returns only fatal errors; see [`LifecycleController::resolve`].
    pub fn resolve_boot_target_for(&self, bundle_file_name: &str) -> Result<BootTarget, Error> {
        let mut inner = self.lock();
        Self::resolve_locked(&mut inner, bundle_file_name.to_string())
    }

    fn resolve_locked(inner: &mut Inner, bundle_file_name: String) -> Result<BootTarget, Error> {
        let resolution = inner.controller.resolve(&bundle_file_name)?;
        inner.launch.assets_bundle_file_name = bundle_file_name;
        inner.launch.apply(&resolution);
        Ok(resolution.target)
    }

    /// Confirm that the running update started successfully
    ///
    /// # Errors
    ///
    /// Returns a storage error if the pending record cannot be removed.
    pub fn confirm_ready(&self) -> Result<(), Error> {
        self.lock().controller.confirm_ready()
    }

    /// Whether this launch is the first run of a new package
    #[must_use]
    pub fn did_just_update(&self) -> bool {
        self.lock().launch.did_update
    }

    /// Drop every installed package and all pending and failed records
    ///
    /// # Errors
    ///
    /// Returns a storage error if the state cannot be removed.
    pub fn discard_all_updates(&self) -> Result<(), Error> {
        self.lock().controller.discard_all_updates()
    }

    /// Whether the last resolution chose the bundle embedded in the binary
    #[must_use]
    pub fn is_running_embedded_binary(&self) -> bool {
        self.lock().launch.running_binary
    }

    /// Whether a rollback happened that telemetry has not reported yet
    #[must_use]
    pub fn need_to_report_rollback(&self) -> bool {
        self.lock().launch.need_to_report_rollback
    }

    pub fn set_need_to_report_rollback(&self, value: bool) {
        self.lock().launch.need_to_report_rollback = value;
    }

    /// Install a downloaded package; see [`LifecycleController::install_update`]
    ///
    /// # Errors
    ///
    /// Returns a storage or configuration error if the install fails.
    pub fn install_update(
        &self,
        record: &PackageRecord,
        files_dir: &Path,
    ) -> Result<PackageRecord, Error> {
        self.lock().controller.install_update(record, files_dir)
    }

    /// Metadata of the current package
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn current_package(&self) -> Result<Option<PackageRecord>, Error> {
        self.lock().controller.current_package()
    }

    /// Metadata of the package kept for rollback
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn previous_package(&self) -> Result<Option<PackageRecord>, Error> {
        self.lock().controller.previous_package()
    }

    /// # Errors
    ///
    /// Returns an error if the pending record cannot be read or parsed.
    pub fn pending_update(&self) -> Result<Option<PendingUpdate>, Error> {
        self.lock().controller.pending_update()
    }

    /// Updates that failed to confirm, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the failed set cannot be read.
    pub fn failed_updates(&self) -> Result<Vec<FailedUpdate>, Error> {
        self.lock().controller.failed_updates()
    }

    /// # Errors
    ///
    /// Returns an error if the failed set cannot be read.
    pub fn is_failed_update(&self, package_hash: &str) -> Result<bool, Error> {
        self.lock().controller.is_failed_update(package_hash)
    }

    /// # Errors
    ///
    /// Returns an error if the pending record cannot be read.
    pub fn is_pending_update(&self, package_hash: Option<&str>) -> Result<bool, Error> {
        self.lock().controller.is_pending_update(package_hash)
    }

    /// Lifecycle state as of the last resolution
    ///
    /// # Errors
    ///
    /// Returns an error if the pending record cannot be read.
    pub fn status(&self) -> Result<LifecycleStatus, Error> {
        let inner = self.lock();
        inner.controller.status(inner.launch.running_binary)
    }

    /// Version string of the running binary
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the build metadata is unavailable.
    pub fn app_version(&self) -> Result<String, Error> {
        Ok(self.lock().controller.binary_identity()?.app_version)
    }

    /// Bundle file name used by the last resolution
    #[must_use]
    pub fn assets_bundle_file_name(&self) -> String {
        self.lock().launch.assets_bundle_file_name.clone()
    }

    /// Remove the cached development bundle if an update is waiting
    ///
    /// # Errors
    ///
    /// Returns a storage error if the cache cannot be removed.
    pub fn clear_debug_cache_if_needed(&self) -> Result<bool, Error> {
        self.lock().controller.clear_debug_cache_if_needed()
    }

    /// Snapshot of the launch state
    #[must_use]
    pub fn launch_state(&self) -> LaunchState {
        self.lock().launch.clone()
    }
}
