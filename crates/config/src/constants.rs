//! Fixed names used inside the update data directory
//!
//! These are not exposed via TOML configuration: the on-disk layout has to
//! stay stable across client releases so an upgraded client can still read
//! the state a previous one left behind.

/// Bundle file name used when the host does not name one
pub const DEFAULT_BUNDLE_FILE_NAME: &str = "index.android.bundle";

/// Prefix that turns a bundle file name into the embedded asset location
pub const BINARY_BUNDLE_PREFIX: &str = "assets://";

/// Subdirectory holding the durable key/value settings
pub const SETTINGS_DIR: &str = "settings";

/// Subdirectory holding installed update packages
pub const PACKAGES_DIR: &str = "packages";

/// Subdirectory for debug log files written by the host simulator
pub const LOGS_DIR: &str = "logs";

/// Build metadata file shipped next to the host binary
pub const BUILD_INFO_FILE: &str = "build-info.toml";

/// Development bundle cached by the host runtime's dev server support
pub const DEV_BUNDLE_CACHE_FILE: &str = "ReactNativeDevBundle.js";

/// Fallback data directory when the platform offers none
pub const FALLBACK_DATA_DIR: &str = ".ota";
