use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Update lifecycle events: boot selection, crash recovery and confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// The launch target was decided
    BootTargetResolved {
        path: PathBuf,
        package_hash: Option<String>,
        running_binary: bool,
    },

    /// A package is about to run for the first time; the crash trap is armed
    UpdateArmed { package_hash: String },

    /// A package never confirmed itself and was rolled back
    RollbackPerformed {
        failed_hash: String,
        restored_hash: Option<String>,
    },

    /// The pending package targets a different binary and was skipped
    StalePackageIgnored {
        package_hash: String,
        recorded_version: Option<String>,
        binary_version: String,
    },

    /// Every package and pending/failed record was dropped
    UpdatesDiscarded { reason: String },

    /// The running application confirmed a successful start
    UpdateConfirmed { package_hash: Option<String> },

    /// A new package was promoted to the current slot
    PackageInstalled {
        package_hash: String,
        label: Option<String>,
        previous_hash: Option<String>,
    },

    /// Storage failed while resolving; the launch falls back to the binary
    StorageFallback {
        operation: String,
        failure: FailureContext,
    },

    /// A persisted record could not be parsed and was ignored
    MalformedRecord { key: String, message: String },

    /// The host's cached development bundle was removed
    DebugCacheCleared { path: PathBuf },
}

impl LifecycleEvent {
    /// The package this event concerns; a rollback concerns the failed one
    #[must_use]
    pub fn package_hash(&self) -> Option<&str> {
        match self {
            Self::BootTargetResolved { package_hash, .. }
            | Self::UpdateConfirmed { package_hash } => package_hash.as_deref(),
            Self::UpdateArmed { package_hash }
            | Self::StalePackageIgnored { package_hash, .. }
            | Self::PackageInstalled { package_hash, .. } => Some(package_hash.as_str()),
            Self::RollbackPerformed { failed_hash, .. } => Some(failed_hash.as_str()),
            Self::UpdatesDiscarded { .. }
            | Self::StorageFallback { .. }
            | Self::MalformedRecord { .. }
            | Self::DebugCacheCleared { .. } => None,
        }
    }
}
