//! Knobs the controller reads on every launch

use ota_config::{constants, Config};
use std::path::PathBuf;

/// Runtime options for the lifecycle controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Bundle file name used when the host does not name one
    pub bundle_file_name: String,
    /// Prefix turning a bundle file name into the embedded asset location
    pub binary_prefix: String,
    /// Interactive development: outdated packages are kept while the binary
    /// version is unchanged, and the dev bundle cache may be cleared
    pub development_mode: bool,
    /// Compare only build timestamps when deciding whether a package is latest
    pub test_configuration: bool,
    /// Development bundle cached by the host runtime
    pub dev_bundle_cache_path: Option<PathBuf>,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            bundle_file_name: constants::DEFAULT_BUNDLE_FILE_NAME.to_string(),
            binary_prefix: constants::BINARY_BUNDLE_PREFIX.to_string(),
            development_mode: false,
            test_configuration: false,
            dev_bundle_cache_path: None,
        }
    }
}

impl LifecycleOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            bundle_file_name: config.bundle.file_name.clone(),
            binary_prefix: config.bundle.binary_prefix.clone(),
            development_mode: config.runtime.development_mode,
            test_configuration: config.runtime.test_configuration,
            dev_bundle_cache_path: Some(config.dev_bundle_cache_path()),
        }
    }

    /// Location of the bundle embedded in the host binary
    #[must_use]
    pub fn binary_bundle_path(&self, bundle_file_name: &str) -> PathBuf {
        PathBuf::from(format!("{}{bundle_file_name}", self.binary_prefix))
    }
}
