//! Lifecycle state type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A package selected to boot but not yet confirmed by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub package_hash: String,
    /// `true` once control has been handed to the package; a pending record
    /// still carrying `true` at the next launch means the package never
    /// confirmed itself.
    pub is_first_run: bool,
}

impl PendingUpdate {
    pub fn new(package_hash: impl Into<String>, is_first_run: bool) -> Self {
        Self {
            package_hash: package_hash.into(),
            is_first_run,
        }
    }
}

/// The bundle chosen for this launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BootTarget {
    /// The bundle embedded in the host binary
    Binary { path: PathBuf },
    /// An installed update package
    Package { path: PathBuf, package_hash: String },
}

impl BootTarget {
    /// Filesystem path (or asset URL) the host runtime should load
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Binary { path } | Self::Package { path, .. } => path,
        }
    }

    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary { .. })
    }

    #[must_use]
    pub fn package_hash(&self) -> Option<&str> {
        match self {
            Self::Binary { .. } => None,
            Self::Package { package_hash, .. } => Some(package_hash),
        }
    }
}

impl fmt::Display for BootTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// Conceptual lifecycle state, derived from the persisted records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// No usable package; the embedded bundle executes
    RunningBinary,
    /// A package is current and has confirmed itself
    RunningConfirmedPackage,
    /// A package is current and on probation for this launch
    RunningUnconfirmedPackage,
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunningBinary => write!(f, "running binary"),
            Self::RunningConfirmedPackage => write!(f, "running confirmed package"),
            Self::RunningUnconfirmedPackage => write!(f, "running unconfirmed package"),
        }
    }
}
