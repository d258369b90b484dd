//! Integration tests for types

#[cfg(test)]
mod tests {
    use ota_types::*;
    use std::path::Path;

    #[test]
    fn test_pending_update_serialization() {
        let pending = PendingUpdate::new("h1", true);
        let json = serde_json::to_string(&pending).unwrap();
        assert_eq!(json, r#"{"packageHash":"h1","isFirstRun":true}"#);
    }

    #[test]
    fn test_boot_target_accessors() {
        let binary = BootTarget::Binary {
            path: "assets://index.android.bundle".into(),
        };
        assert!(binary.is_binary());
        assert_eq!(binary.package_hash(), None);

        let package = BootTarget::Package {
            path: "/data/ota/h1/index.android.bundle".into(),
            package_hash: "h1".into(),
        };
        assert!(!package.is_binary());
        assert_eq!(package.package_hash(), Some("h1"));
        assert_eq!(package.path(), Path::new("/data/ota/h1/index.android.bundle"));
    }

    #[test]
    fn test_failed_update_from_record() {
        let record = PackageRecord::new("h1")
            .with_app_version("1.0")
            .with_deployment_key("staging-key")
            .with_label("v7");
        let failed = FailedUpdate::from_record(&record, chrono::Utc::now());
        assert_eq!(failed.package_hash, "h1");
        assert_eq!(failed.app_version.as_deref(), Some("1.0"));
        assert_eq!(failed.deployment_key.as_deref(), Some("staging-key"));
    }

    #[test]
    fn test_output_format_serialization() {
        let json = serde_json::to_string(&OutputFormat::Json).unwrap();
        assert_eq!(json, r#""json""#);
    }
}
