//! Integration tests for settings crate

#[cfg(test)]
mod tests {
    use ota_settings::*;
    use ota_types::{PackageRecord, PendingUpdate};
    use tempfile::tempdir;

    #[test]
    fn test_records_survive_reopen() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("settings");

        {
            let settings = SettingsManager::new(FileKeyValueStore::open(&dir).unwrap());
            settings.save_pending_update("h1", true).unwrap();
            settings
                .save_failed_update(&PackageRecord::new("h0").with_label("v0"))
                .unwrap();
        }

        let settings = SettingsManager::new(FileKeyValueStore::open(&dir).unwrap());
        assert_eq!(
            settings.pending_update().unwrap(),
            Some(PendingUpdate::new("h1", true))
        );
        let failed = settings.failed_updates().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].label.as_deref(), Some("v0"));
    }

    #[test]
    fn test_boxed_store_behaves_the_same() {
        let store: Box<dyn KeyValueStore> = Box::new(MemoryKeyValueStore::new());
        let settings = SettingsManager::new(store);
        settings.save_pending_update("h1", false).unwrap();
        assert!(settings.is_pending_update(Some("h1")).unwrap());
    }
}
