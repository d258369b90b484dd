//! Integration tests for lifecycle crate
//!
//! Every `launch` call builds a fresh selector over the same directories,
//! which is what a process restart looks like to the lifecycle code.

#[cfg(test)]
mod tests {
    use ota_errors::{Error, LifecycleError, StorageError};
    use ota_events::{channel, AppEvent, EventReceiver, LifecycleEvent};
    use ota_lifecycle::*;
    use ota_platform::StaticBinaryIdentity;
    use ota_settings::{FileKeyValueStore, KeyValueStore, SettingsManager, PENDING_UPDATE_KEY};
    use ota_store::PackageStore;
    use ota_types::{BootTarget, LifecycleStatus, PackageRecord, PendingUpdate};
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    const V1: (&str, &str) = ("1.0", "100");
    const V2: (&str, &str) = ("1.1", "150");

    /// Settings backend that fails selected operations
    struct FailingStore {
        inner: FileKeyValueStore,
        fail_put: Option<&'static str>,
        fail_get: bool,
        fail_remove: Option<&'static str>,
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
            if self.fail_get {
                return Err(StorageError::IoError {
                    message: "injected read failure".into(),
                }
                .into());
            }
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &[u8]) -> Result<(), Error> {
            if self.fail_put == Some(key) {
                return Err(StorageError::DiskFull { path: key.into() }.into());
            }
            self.inner.put(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), Error> {
            if self.fail_remove == Some(key) {
                return Err(StorageError::IoError {
                    message: "injected remove failure".into(),
                }
                .into());
            }
            self.inner.remove(key)
        }
    }

    struct Harness {
        temp: TempDir,
        options: LifecycleOptions,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_options(LifecycleOptions::default())
        }

        fn with_options(options: LifecycleOptions) -> Self {
            Self {
                temp: tempdir().unwrap(),
                options,
            }
        }

        fn settings_dir(&self) -> PathBuf {
            self.temp.path().join("data/settings")
        }

        fn packages_dir(&self) -> PathBuf {
            self.temp.path().join("data/packages")
        }

        fn controller_with(
            &self,
            kv: Box<dyn KeyValueStore>,
            binary: (&str, &str),
        ) -> LifecycleController {
            LifecycleController::new(
                PackageStore::open(self.packages_dir()).unwrap(),
                SettingsManager::new(kv),
                Box::new(StaticBinaryIdentity::new(binary.0, binary.1)),
                self.options.clone(),
            )
        }

        fn file_kv(&self) -> FileKeyValueStore {
            FileKeyValueStore::open(self.settings_dir()).unwrap()
        }

        fn launch(&self, binary: (&str, &str)) -> BundleSelector {
            BundleSelector::new(self.controller_with(Box::new(self.file_kv()), binary))
        }

        fn launch_with_events(&self, binary: (&str, &str)) -> (BundleSelector, EventReceiver) {
            let (tx, rx) = channel();
            let controller = self
                .controller_with(Box::new(self.file_kv()), binary)
                .with_events(tx);
            (BundleSelector::new(controller), rx)
        }

        fn launch_failing(
            &self,
            binary: (&str, &str),
            fail_put: Option<&'static str>,
            fail_get: bool,
        ) -> BundleSelector {
            let kv = FailingStore {
                inner: self.file_kv(),
                fail_put,
                fail_get,
                fail_remove: None,
            };
            BundleSelector::new(self.controller_with(Box::new(kv), binary))
        }

        fn launch_failing_remove(
            &self,
            binary: (&str, &str),
            fail_remove: &'static str,
        ) -> BundleSelector {
            let kv = FailingStore {
                inner: self.file_kv(),
                fail_put: None,
                fail_get: false,
                fail_remove: Some(fail_remove),
            };
            BundleSelector::new(self.controller_with(Box::new(kv), binary))
        }

        /// Install h1 and confirm it, then install h2 and run it unconfirmed
        fn crash_after_second_install(&self) {
            self.install("h1", V1);
            let selector = self.launch(V1);
            selector.resolve_boot_target().unwrap();
            selector.confirm_ready().unwrap();
            self.install("h2", V1);
            self.launch(V1).resolve_boot_target().unwrap();
        }

        fn settings(&self) -> SettingsManager<FileKeyValueStore> {
            SettingsManager::new(self.file_kv())
        }

        fn package_files(&self, name: &str) -> PathBuf {
            let dir = self.temp.path().join("downloads").join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("index.android.bundle"), name).unwrap();
            dir
        }

        /// Install a package built for `binary` from a process running `binary`
        fn install(&self, hash: &str, binary: (&str, &str)) {
            let record = PackageRecord::new(hash)
                .with_app_version(binary.0)
                .with_binary_modified_time(binary.1.parse().unwrap())
                .with_label(format!("label-{hash}"));
            self.launch(binary)
                .install_update(&record, &self.package_files(hash))
                .unwrap();
        }

        fn package_bundle(&self, hash: &str) -> BootTarget {
            BootTarget::Package {
                path: self.packages_dir().join(hash).join("index.android.bundle"),
                package_hash: hash.to_string(),
            }
        }

        fn failed_hashes(&self) -> Vec<String> {
            self.settings()
                .failed_updates()
                .unwrap()
                .into_iter()
                .map(|failed| failed.package_hash)
                .collect()
        }

        /// Every file under the data directory with its contents
        fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
            fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
                let Ok(entries) = fs::read_dir(dir) else {
                    return;
                };
                for entry in entries {
                    let path = entry.unwrap().path();
                    let relative = path.strip_prefix(root).unwrap().to_path_buf();
                    if path.is_dir() {
                        out.insert(relative, Vec::new());
                        walk(root, &path, out);
                    } else {
                        out.insert(relative, fs::read(&path).unwrap());
                    }
                }
            }
            let root = self.temp.path().join("data");
            let mut out = BTreeMap::new();
            walk(&root, &root, &mut out);
            out
        }
    }

    fn binary_bundle() -> BootTarget {
        BootTarget::Binary {
            path: PathBuf::from("assets://index.android.bundle"),
        }
    }

    fn drain(rx: &mut EventReceiver) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let AppEvent::Lifecycle(event) = message.event {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_fresh_install_boots_binary() {
        let harness = Harness::new();
        let selector = harness.launch(V1);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert!(selector.is_running_embedded_binary());
        assert!(!selector.did_just_update());
        assert_eq!(selector.status().unwrap(), LifecycleStatus::RunningBinary);
    }

    #[test]
    fn test_first_run_arms_the_crash_trap() {
        let harness = Harness::new();
        harness.install("h1", V1);
        assert_eq!(
            harness.settings().pending_update().unwrap(),
            Some(PendingUpdate::new("h1", false))
        );

        let selector = harness.launch(V1);
        assert_eq!(
            selector.resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
        assert_eq!(
            harness.settings().pending_update().unwrap(),
            Some(PendingUpdate::new("h1", true))
        );
        assert!(selector.did_just_update());
        assert!(!selector.is_running_embedded_binary());
        assert_eq!(
            selector.status().unwrap(),
            LifecycleStatus::RunningUnconfirmedPackage
        );
    }

    #[test]
    fn test_crash_before_confirm_rolls_back_to_binary() {
        let harness = Harness::new();
        harness.install("h1", V1);
        harness.launch(V1).resolve_boot_target().unwrap();

        let (selector, mut rx) = harness.launch_with_events(V1);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert_eq!(harness.failed_hashes(), vec!["h1"]);
        assert_eq!(harness.settings().pending_update().unwrap(), None);
        assert!(selector.current_package().unwrap().is_none());
        assert!(selector.need_to_report_rollback());
        assert!(selector.is_failed_update("h1").unwrap());

        let events = drain(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            LifecycleEvent::RollbackPerformed { failed_hash, restored_hash: None } if failed_hash == "h1"
        )));

        selector.set_need_to_report_rollback(false);
        assert!(!selector.need_to_report_rollback());
    }

    #[test]
    fn test_confirmed_package_survives_relaunch() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let first = harness.launch(V1);
        first.resolve_boot_target().unwrap();
        first.confirm_ready().unwrap();
        assert_eq!(
            first.status().unwrap(),
            LifecycleStatus::RunningConfirmedPackage
        );

        let selector = harness.launch(V1);
        assert_eq!(harness.settings().pending_update().unwrap(), None);
        assert_eq!(
            selector.resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
        assert!(!selector.did_just_update());
        assert!(!selector.need_to_report_rollback());
        assert!(harness.failed_hashes().is_empty());
    }

    #[test]
    fn test_new_binary_purges_packages() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let first = harness.launch(V1);
        first.resolve_boot_target().unwrap();
        first.confirm_ready().unwrap();

        let selector = harness.launch(V2);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert!(selector.current_package().unwrap().is_none());
        assert_eq!(fs::read_dir(harness.packages_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_rollback_restores_previous_package_once() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let first = harness.launch(V1);
        first.resolve_boot_target().unwrap();
        first.confirm_ready().unwrap();

        harness.install("h2", V1);
        assert_eq!(
            harness.launch(V1).resolve_boot_target().unwrap(),
            harness.package_bundle("h2")
        );

        // Crash, relaunch: back on h1
        let selector = harness.launch(V1);
        assert_eq!(
            selector.resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
        assert_eq!(harness.failed_hashes(), vec!["h2"]);

        // The same broken package is offered and crashes again
        harness.install("h2", V1);
        harness.launch(V1).resolve_boot_target().unwrap();
        harness.launch(V1).resolve_boot_target().unwrap();
        assert_eq!(harness.failed_hashes(), vec!["h2"]);

        // h1 was confirmed long ago; further launches keep it
        assert_eq!(
            harness.launch(V1).resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
    }

    #[test]
    fn test_crash_after_confirm_does_not_roll_back() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let first = harness.launch(V1);
        first.resolve_boot_target().unwrap();
        first.confirm_ready().unwrap();
        first.confirm_ready().unwrap();
        drop(first);

        for _ in 0..3 {
            let selector = harness.launch(V1);
            assert_eq!(
                selector.resolve_boot_target().unwrap(),
                harness.package_bundle("h1")
            );
            assert!(!selector.need_to_report_rollback());
        }
        assert!(harness.failed_hashes().is_empty());
    }

    #[test]
    fn test_pending_package_for_other_binary_is_never_booted() {
        let harness = Harness::new();
        harness.install("h1", V1);

        let selector = harness.launch(V2);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert!(!selector.did_just_update());
        assert!(!selector.need_to_report_rollback());
        assert!(harness.failed_hashes().is_empty());
        assert!(selector.current_package().unwrap().is_none());
        assert_eq!(harness.settings().pending_update().unwrap(), None);
    }

    #[test]
    fn test_rebuilt_binary_with_same_version_invalidates_package() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let selector = harness.launch(("1.0", "120"));
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert!(selector.current_package().unwrap().is_none());
    }

    #[test]
    fn test_development_mode_keeps_outdated_package_for_same_version() {
        let harness = Harness::with_options(LifecycleOptions {
            development_mode: true,
            ..LifecycleOptions::default()
        });
        harness.install("h1", V1);
        let first = harness.launch(V1);
        first.resolve_boot_target().unwrap();
        first.confirm_ready().unwrap();

        let selector = harness.launch(("1.0", "120"));
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert!(!selector.did_just_update());
        assert_eq!(
            selector.current_package().unwrap().map(|p| p.package_hash),
            Some("h1".to_string())
        );

        // A version bump purges even in development mode
        let selector = harness.launch(V2);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert!(selector.current_package().unwrap().is_none());
    }

    #[test]
    fn test_test_configuration_ignores_app_version() {
        let harness = Harness::with_options(LifecycleOptions {
            test_configuration: true,
            ..LifecycleOptions::default()
        });
        let record = PackageRecord::new("h1")
            .with_app_version("0.9")
            .with_binary_modified_time(100);
        harness
            .launch(V1)
            .install_update(&record, &harness.package_files("h1"))
            .unwrap();

        assert_eq!(
            harness.launch(V1).resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
    }

    #[test]
    fn test_discard_all_updates_is_idempotent() {
        let harness = Harness::new();
        harness.install("h1", V1);
        harness.launch(V1).resolve_boot_target().unwrap();
        harness.launch(V1).resolve_boot_target().unwrap();
        harness.install("h2", V1);

        let selector = harness.launch(V1);
        selector.discard_all_updates().unwrap();
        let first = harness.snapshot();
        selector.discard_all_updates().unwrap();
        assert_eq!(harness.snapshot(), first);

        assert!(harness.failed_hashes().is_empty());
        assert!(!selector.is_pending_update(None).unwrap());
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
    }

    #[test]
    fn test_install_stamps_binary_identity() {
        let harness = Harness::new();
        let installed = harness
            .launch(V1)
            .install_update(&PackageRecord::new("h1"), &harness.package_files("h1"))
            .unwrap();
        assert_eq!(installed.app_version.as_deref(), Some("1.0"));
        assert_eq!(installed.binary_modified_time.as_deref(), Some("100"));

        let selector = harness.launch(V1);
        assert_eq!(selector.current_package().unwrap(), Some(installed));
        assert!(selector.is_pending_update(Some("h1")).unwrap());
        assert_eq!(
            selector.resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
    }

    #[test]
    fn test_failed_install_withdraws_pending_record() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let first = harness.launch(V1);
        first.resolve_boot_target().unwrap();
        first.confirm_ready().unwrap();

        let err = first
            .install_update(
                &PackageRecord::new("h2"),
                &harness.temp.path().join("missing"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!first.is_pending_update(None).unwrap());
        assert_eq!(
            harness.launch(V1).resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
    }

    #[test]
    fn test_pending_record_for_non_current_package_is_discarded() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let first = harness.launch(V1);
        first.resolve_boot_target().unwrap();
        first.confirm_ready().unwrap();

        // Interrupted install: pending written, promotion never happened
        harness.settings().save_pending_update("h9", false).unwrap();

        let selector = harness.launch(V1);
        assert_eq!(
            selector.resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
        assert!(!selector.did_just_update());
        assert_eq!(harness.settings().pending_update().unwrap(), None);
    }

    #[test]
    fn test_malformed_pending_record_is_ignored() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let first = harness.launch(V1);
        first.resolve_boot_target().unwrap();
        first.confirm_ready().unwrap();

        harness
            .file_kv()
            .put(PENDING_UPDATE_KEY, b"{\"packageHash\":")
            .unwrap();

        let (selector, mut rx) = harness.launch_with_events(V1);
        assert_eq!(
            selector.resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
        assert!(drain(&mut rx)
            .iter()
            .any(|event| matches!(event, LifecycleEvent::MalformedRecord { .. })));
        assert!(harness.settings_dir().join(PENDING_UPDATE_KEY).exists());
    }

    #[test]
    fn test_arming_failure_falls_back_to_binary() {
        let harness = Harness::new();
        harness.install("h1", V1);

        let selector = harness.launch_failing(V1, Some(PENDING_UPDATE_KEY), false);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert!(selector.is_running_embedded_binary());
        assert!(!selector.did_just_update());
        assert_eq!(
            harness.settings().pending_update().unwrap(),
            Some(PendingUpdate::new("h1", false))
        );

        // Storage recovered: the package gets its first run now
        assert_eq!(
            harness.launch(V1).resolve_boot_target().unwrap(),
            harness.package_bundle("h1")
        );
    }

    #[test]
    fn test_unreadable_settings_fall_back_to_binary() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let selector = harness.launch_failing(V1, None, true);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
    }

    #[test]
    fn test_unwritable_slots_during_rollback_is_unrecoverable() {
        let harness = Harness::new();
        harness.crash_after_second_install();
        let selector = harness.launch(V1);

        // A non-empty directory in its place defeats the atomic rename
        let slots = harness.packages_dir().join("slots.json");
        fs::remove_file(&slots).unwrap();
        fs::create_dir_all(slots.join("blocked")).unwrap();

        let err = selector.resolve_boot_target().unwrap_err();
        assert!(matches!(
            err,
            Error::Lifecycle(LifecycleError::UnrecoverableStorage { ref hash, .. }) if hash == "h2"
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_failed_set_write_during_rollback_falls_back() {
        let harness = Harness::new();
        harness.crash_after_second_install();

        let selector = harness.launch_failing(V1, Some(ota_settings::FAILED_UPDATES_KEY), false);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert!(!selector.need_to_report_rollback());
        assert_eq!(
            harness.settings().pending_update().unwrap(),
            Some(PendingUpdate::new("h2", true))
        );
        assert_eq!(
            selector.current_package().unwrap().map(|p| p.package_hash),
            Some("h2".to_string())
        );

        // The trap is still armed, so the next launch completes the rollback
        let selector = harness.launch(V1);
        assert_eq!(selector.resolve_boot_target().unwrap(), harness.package_bundle("h1"));
        assert!(selector.need_to_report_rollback());
        assert_eq!(harness.failed_hashes(), vec!["h2".to_string()]);
    }

    #[test]
    fn test_pending_removal_failure_after_rollback_still_boots_previous() {
        let harness = Harness::new();
        harness.crash_after_second_install();

        let selector = harness.launch_failing_remove(V1, PENDING_UPDATE_KEY);
        assert_eq!(selector.resolve_boot_target().unwrap(), harness.package_bundle("h1"));
        assert!(selector.need_to_report_rollback());
        assert_eq!(harness.failed_hashes(), vec!["h2".to_string()]);
        assert_eq!(
            harness.settings().pending_update().unwrap(),
            Some(PendingUpdate::new("h2", true))
        );

        // The leftover record names a package that is no longer current
        let selector = harness.launch(V1);
        assert_eq!(selector.resolve_boot_target().unwrap(), harness.package_bundle("h1"));
        assert!(!selector.need_to_report_rollback());
        assert_eq!(harness.settings().pending_update().unwrap(), None);
    }

    #[test]
    fn test_unparseable_build_timestamp_is_reported_before_purge() {
        let harness = Harness::new();
        let mut record = PackageRecord::new("h1").with_app_version(V1.0);
        record.binary_modified_time = Some("not-a-timestamp".to_string());
        harness
            .launch(V1)
            .install_update(&record, &harness.package_files("h1"))
            .unwrap();

        let (selector, mut rx) = harness.launch_with_events(V1);
        assert_eq!(selector.resolve_boot_target().unwrap(), binary_bundle());
        assert_eq!(selector.current_package().unwrap(), None);

        let events = drain(&mut rx);
        let malformed = events
            .iter()
            .position(|event| {
                matches!(event, LifecycleEvent::MalformedRecord { key, message }
                    if key == "binaryModifiedTime" && message.contains("h1"))
            })
            .expect("malformed timestamp not reported");
        let discarded = events
            .iter()
            .position(|event| matches!(event, LifecycleEvent::UpdatesDiscarded { .. }))
            .expect("package not purged");
        assert!(malformed < discarded);
    }

    #[test]
    fn test_unreadable_binary_identity_is_fatal() {
        let harness = Harness::new();
        let selector = harness.launch(("1.0", "not-a-number"));
        let err = selector.resolve_boot_target().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal());
        assert!(selector.app_version().is_err());
    }

    #[test]
    fn test_resolve_for_named_bundle() {
        let harness = Harness::new();
        let selector = harness.launch(V1);
        assert_eq!(
            selector.resolve_boot_target_for("main.jsbundle").unwrap(),
            BootTarget::Binary {
                path: PathBuf::from("assets://main.jsbundle")
            }
        );
        assert_eq!(selector.assets_bundle_file_name(), "main.jsbundle");
        assert_eq!(selector.app_version().unwrap(), "1.0");
    }

    #[test]
    fn test_debug_cache_cleared_only_in_development_mode() {
        let temp = tempdir().unwrap();
        let cache = temp.path().join("ReactNativeDevBundle.js");

        for (development_mode, expect_removed) in [(false, false), (true, true)] {
            fs::write(&cache, "dev").unwrap();
            let harness = Harness::with_options(LifecycleOptions {
                development_mode,
                dev_bundle_cache_path: Some(cache.clone()),
                ..LifecycleOptions::default()
            });
            let selector = harness.launch(V1);
            assert!(!selector.clear_debug_cache_if_needed().unwrap());

            harness.install("h1", V1);
            let selector = harness.launch(V1);
            assert_eq!(selector.clear_debug_cache_if_needed().unwrap(), expect_removed);
            assert_eq!(cache.exists(), !expect_removed);
        }
    }

    #[test]
    fn test_selector_is_shareable_between_threads() {
        let harness = Harness::new();
        harness.install("h1", V1);
        let selector = Arc::new(harness.launch(V1));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let selector = Arc::clone(&selector);
                std::thread::spawn(move || {
                    if i == 0 {
                        selector.resolve_boot_target().unwrap();
                    }
                    let _ = selector.is_pending_update(None).unwrap();
                    let _ = selector.status().unwrap();
                    selector.launch_state()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!selector.is_running_embedded_binary());
        selector.confirm_ready().unwrap();
        assert_eq!(harness.settings().pending_update().unwrap(), None);
    }

    #[test]
    fn test_concurrent_confirm_install_and_discard_keep_pending_consistent() {
        let harness = Harness::new();
        harness.install("h0", V1);
        let selector = harness.launch(V1);
        selector.resolve_boot_target().unwrap();

        let downloads: Vec<_> = (1..=3)
            .map(|n| {
                let hash = format!("h{n}");
                let files = harness.package_files(&hash);
                (hash, files)
            })
            .collect();

        std::thread::scope(|scope| {
            let selector = &selector;
            for (hash, files) in &downloads {
                scope.spawn(move || {
                    selector
                        .install_update(&PackageRecord::new(hash.as_str()), files)
                        .unwrap();
                });
            }
            scope.spawn(move || {
                for _ in 0..3 {
                    selector.confirm_ready().unwrap();
                }
            });
            scope.spawn(move || selector.discard_all_updates().unwrap());
            scope.spawn(move || {
                selector.is_pending_update(None).unwrap();
                selector.status().unwrap();
            });
        });

        let current = selector.current_package().unwrap().map(|p| p.package_hash);
        if let Some(pending) = selector.pending_update().unwrap() {
            assert_eq!(Some(pending.package_hash), current);
        }

        // Whatever the interleaving, the next launch resolves cleanly
        let target = harness.launch(V1).resolve_boot_target().unwrap();
        match current {
            Some(hash) => assert_eq!(target, harness.package_bundle(&hash)),
            None => assert_eq!(target, binary_bundle()),
        }
    }

    #[derive(Debug, Clone)]
    enum Step {
        Install(u8),
        Launch,
        Confirm,
        Discard,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0u8..3).prop_map(Step::Install),
            Just(Step::Launch),
            Just(Step::Confirm),
            Just(Step::Discard),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_discard_twice_matches_discard_once(steps in prop::collection::vec(step(), 0..8)) {
            let harness = Harness::new();
            for step in &steps {
                let selector = harness.launch(V1);
                match step {
                    Step::Install(n) => {
                        let hash = format!("h{n}");
                        let record = PackageRecord::new(hash.as_str());
                        selector
                            .install_update(&record, &harness.package_files(&hash))
                            .unwrap();
                    }
                    Step::Launch => {
                        selector.resolve_boot_target().unwrap();
                    }
                    Step::Confirm => selector.confirm_ready().unwrap(),
                    Step::Discard => selector.discard_all_updates().unwrap(),
                }
            }

            let selector = harness.launch(V1);
            selector.discard_all_updates().unwrap();
            let once = harness.snapshot();
            selector.discard_all_updates().unwrap();
            prop_assert_eq!(harness.snapshot(), once);
        }

        #[test]
        fn prop_unconfirmed_launch_never_survives_a_crash(confirm_first in any::<bool>()) {
            let harness = Harness::new();
            harness.install("h1", V1);
            let first = harness.launch(V1);
            first.resolve_boot_target().unwrap();
            if confirm_first {
                first.confirm_ready().unwrap();
            }
            drop(first);

            let target = harness.launch(V1).resolve_boot_target().unwrap();
            if confirm_first {
                prop_assert_eq!(target, harness.package_bundle("h1"));
                prop_assert!(harness.failed_hashes().is_empty());
            } else {
                prop_assert_eq!(target, binary_bundle());
                prop_assert_eq!(harness.failed_hashes(), vec!["h1".to_string()]);
            }
        }
    }
}
