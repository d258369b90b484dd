//! Identity of the natively installed host binary.
//!
//! The lifecycle controller compares this identity against the one recorded
//! when a package was installed. A package built for another binary must never
//! boot, so a missing or unreadable identity is a fatal configuration error.

use ota_errors::{ConfigError, Error};
use ota_types::BinaryIdentity;
use std::path::{Path, PathBuf};

/// Accessor for the running binary's version string and build timestamp
pub trait BinaryIdentitySource: Send + Sync {
    /// Query the identity of the running binary
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the build metadata is missing or malformed.
    fn current_binary_identity(&self) -> Result<BinaryIdentity, Error>;
}

impl<T: BinaryIdentitySource + ?Sized> BinaryIdentitySource for Box<T> {
    fn current_binary_identity(&self) -> Result<BinaryIdentity, Error> {
        (**self).current_binary_identity()
    }
}

impl<T: BinaryIdentitySource + ?Sized> BinaryIdentitySource for std::sync::Arc<T> {
    fn current_binary_identity(&self) -> Result<BinaryIdentity, Error> {
        (**self).current_binary_identity()
    }
}

/// Parse a build timestamp as emitted by build tooling.
///
/// Resource pipelines sometimes keep the surrounding quotes, so they are
/// stripped before parsing.
///
/// # Errors
///
/// Returns `ConfigError::BinaryMetadataMalformed` for non-numeric values.
pub fn parse_build_time(raw: &str) -> Result<i64, Error> {
    raw.replace('"', "")
        .trim()
        .parse::<i64>()
        .map_err(|_| {
            ConfigError::BinaryMetadataMalformed {
                field: "build_time".to_string(),
                value: raw.to_string(),
            }
            .into()
        })
}

/// Build metadata shipped next to the binary as a small TOML file:
///
/// ```toml
/// app_version = "1.0"
/// build_time = "1700000000000"
/// ```
///
/// `build_time` may be written as an integer or a string.
#[derive(Debug, Clone)]
pub struct BuildInfoFile {
    path: PathBuf,
}

impl BuildInfoFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, contents: &str) -> Result<BinaryIdentity, Error> {
        let table: toml::Table = toml::from_str(contents).map_err(|e| {
            ConfigError::BinaryMetadataMissing {
                message: format!("{}: {e}", self.path.display()),
            }
        })?;

        let app_version = match table.get("app_version") {
            Some(toml::Value::String(version)) if !version.trim().is_empty() => {
                version.trim().to_string()
            }
            Some(other) => {
                return Err(ConfigError::BinaryMetadataMalformed {
                    field: "app_version".to_string(),
                    value: other.to_string(),
                }
                .into())
            }
            None => {
                return Err(ConfigError::MissingField {
                    field: "app_version".to_string(),
                }
                .into())
            }
        };

        let build_time = match table.get("build_time") {
            Some(toml::Value::Integer(time)) => *time,
            Some(toml::Value::String(raw)) => parse_build_time(raw)?,
            Some(other) => {
                return Err(ConfigError::BinaryMetadataMalformed {
                    field: "build_time".to_string(),
                    value: other.to_string(),
                }
                .into())
            }
            None => {
                return Err(ConfigError::MissingField {
                    field: "build_time".to_string(),
                }
                .into())
            }
        };

        Ok(BinaryIdentity::new(app_version, build_time))
    }
}

impl BinaryIdentitySource for BuildInfoFile {
    fn current_binary_identity(&self) -> Result<BinaryIdentity, Error> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            ConfigError::BinaryMetadataMissing {
                message: format!("{}: {e}", self.path.display()),
            }
        })?;
        self.parse(&contents)
    }
}

/// Identity supplied directly by the host as raw strings
#[derive(Debug, Clone)]
pub struct StaticBinaryIdentity {
    app_version: String,
    build_time: String,
}

impl StaticBinaryIdentity {
    pub fn new(app_version: impl Into<String>, build_time: impl Into<String>) -> Self {
        Self {
            app_version: app_version.into(),
            build_time: build_time.into(),
        }
    }
}

impl From<BinaryIdentity> for StaticBinaryIdentity {
    fn from(identity: BinaryIdentity) -> Self {
        Self::new(identity.app_version, identity.binary_modified_time.to_string())
    }
}

impl BinaryIdentitySource for StaticBinaryIdentity {
    fn current_binary_identity(&self) -> Result<BinaryIdentity, Error> {
        Ok(BinaryIdentity::new(
            self.app_version.clone(),
            parse_build_time(&self.build_time)?,
        ))
    }
}

/// Replaces the version string reported by another source.
///
/// Hosts use this when the native version differs from the version their
/// releases are published under.
#[derive(Debug, Clone)]
pub struct AppVersionOverride<S> {
    inner: S,
    app_version: String,
}

impl<S: BinaryIdentitySource> AppVersionOverride<S> {
    pub fn new(inner: S, app_version: impl Into<String>) -> Self {
        Self {
            inner,
            app_version: app_version.into(),
        }
    }
}

impl<S: BinaryIdentitySource> BinaryIdentitySource for AppVersionOverride<S> {
    fn current_binary_identity(&self) -> Result<BinaryIdentity, Error> {
        let identity = self.inner.current_binary_identity()?;
        Ok(BinaryIdentity::new(
            self.app_version.clone(),
            identity.binary_modified_time,
        ))
    }
}
