#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for ota
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/ota/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;

use ota_errors::{ConfigError, Error};
use ota_types::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub bundle: BundleConfig,

    #[serde(default)]
    pub binary: BinaryConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub default_output: OutputFormat,
    /// Deployment key the client checks updates against
    #[serde(default)]
    pub deployment_key: Option<String>,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub data_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub build_info_path: Option<PathBuf>,
    pub dev_bundle_cache_path: Option<PathBuf>,
}

/// Bundle naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    #[serde(default = "default_bundle_file_name")]
    pub file_name: String,
    #[serde(default = "default_binary_prefix")]
    pub binary_prefix: String,
}

/// Host binary configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BinaryConfig {
    /// Replaces the version name the binary reports about itself
    pub app_version_override: Option<String>,
}

/// Runtime mode switches
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// Interactive development: packages built against the current binary
    /// version survive a rebuild, and the dev bundle cache is cleared when an
    /// update is pending.
    #[serde(default)]
    pub development_mode: bool,
    /// Compare only build timestamps when deciding whether a package is
    /// current, so test packages can target a relabelled binary.
    #[serde(default)]
    pub test_configuration: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            file_name: default_bundle_file_name(),
            binary_prefix: default_binary_prefix(),
        }
    }
}

fn default_bundle_file_name() -> String {
    constants::DEFAULT_BUNDLE_FILE_NAME.to_string()
}

fn default_binary_prefix() -> String {
    constants::BINARY_BUNDLE_PREFIX.to_string()
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("ota").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound {
            path: path.display().to_string(),
        })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            tracing::debug!(
                "no config file at {}, using defaults",
                config_path.display()
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path),
            None => Self::load(),
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // OTA_OUTPUT
        if let Ok(output) = std::env::var("OTA_OUTPUT") {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "OTA_OUTPUT".to_string(),
                        value: output,
                    }
                    .into())
                }
            };
        }

        if let Ok(dir) = std::env::var("OTA_DATA_DIR") {
            self.paths.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(key) = std::env::var("OTA_DEPLOYMENT_KEY") {
            self.general.deployment_key = Some(key);
        }

        if let Ok(version) = std::env::var("OTA_APP_VERSION") {
            self.binary.app_version_override = Some(version);
        }

        if let Ok(name) = std::env::var("OTA_BUNDLE_FILE_NAME") {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "OTA_BUNDLE_FILE_NAME".to_string(),
                    value: name,
                }
                .into());
            }
            self.bundle.file_name = name;
        }

        if let Ok(value) = std::env::var("OTA_DEVELOPMENT_MODE") {
            self.runtime.development_mode = parse_bool("OTA_DEVELOPMENT_MODE", value)?;
        }

        if let Ok(value) = std::env::var("OTA_TEST_CONFIGURATION") {
            self.runtime.test_configuration = parse_bool("OTA_TEST_CONFIGURATION", value)?;
        }

        Ok(())
    }

    /// Get the data directory (with default)
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join("ota"))
                .unwrap_or_else(|| PathBuf::from(constants::FALLBACK_DATA_DIR))
        })
    }

    /// Directory backing the durable settings store
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir().join(constants::SETTINGS_DIR)
    }

    /// Directory holding installed packages
    #[must_use]
    pub fn packages_path(&self) -> PathBuf {
        self.data_dir().join(constants::PACKAGES_DIR)
    }

    /// Get the log directory (with default)
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.paths
            .log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join(constants::LOGS_DIR))
    }

    /// Build metadata file describing the host binary
    #[must_use]
    pub fn build_info_path(&self) -> PathBuf {
        self.paths
            .build_info_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(constants::BUILD_INFO_FILE))
    }

    /// Cached development bundle that shadows packages in development mode
    #[must_use]
    pub fn dev_bundle_cache_path(&self) -> PathBuf {
        self.paths
            .dev_bundle_cache_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(constants::DEV_BUNDLE_CACHE_FILE))
    }
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}
