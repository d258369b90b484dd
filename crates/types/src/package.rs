//! Package-related type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;

/// Metadata for one installed update package.
///
/// Records are immutable once written to the package store. The builder
/// methods consume `self` and are meant for the acquisition side that
/// assembles a record before installing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    /// Content-derived identifier, unique per package
    pub package_hash: String,
    /// Host binary version the package was installed against
    #[serde(default)]
    pub app_version: Option<String>,
    /// Host binary build timestamp at install time, string-encoded integer
    #[serde(default)]
    pub binary_modified_time: Option<String>,
    #[serde(default)]
    pub deployment_key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub package_size: u64,
    #[serde(default)]
    pub description: Option<String>,
    /// Bundle location relative to the package directory
    #[serde(default)]
    pub bundle_path: Option<String>,
    /// Collaborator-defined fields (diff base hash and friends), kept as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PackageRecord {
    /// Create a record for a package hash
    pub fn new(package_hash: impl Into<String>) -> Self {
        Self {
            package_hash: package_hash.into(),
            app_version: None,
            binary_modified_time: None,
            deployment_key: None,
            label: None,
            is_mandatory: false,
            package_size: 0,
            description: None,
            bundle_path: None,
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = Some(app_version.into());
        self
    }

    #[must_use]
    pub fn with_binary_modified_time(mut self, time: i64) -> Self {
        self.binary_modified_time = Some(time.to_string());
        self
    }

    #[must_use]
    pub fn with_deployment_key(mut self, key: impl Into<String>) -> Self {
        self.deployment_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_bundle_path(mut self, bundle_path: impl Into<String>) -> Self {
        self.bundle_path = Some(bundle_path.into());
        self
    }

    #[must_use]
    pub fn with_package_size(mut self, size: u64) -> Self {
        self.package_size = size;
        self
    }

    /// Parse the recorded binary build timestamp.
    ///
    /// Returns `Ok(None)` when the record carries no timestamp.
    ///
    /// # Errors
    ///
    /// Returns a parse error when the timestamp is not an integer.
    pub fn parsed_binary_modified_time(&self) -> Result<Option<i64>, ParseIntError> {
        self.binary_modified_time
            .as_deref()
            .map(|raw| raw.replace('"', "").trim().parse::<i64>())
            .transpose()
    }

    /// Whether the package was installed against exactly this binary build.
    ///
    /// With `ignore_app_version` only the build timestamp is compared, which
    /// is how test configurations run packages against a relabelled binary.
    #[must_use]
    pub fn is_latest_for(&self, binary: &BinaryIdentity, ignore_app_version: bool) -> bool {
        let Ok(Some(time)) = self.parsed_binary_modified_time() else {
            return false;
        };
        time == binary.binary_modified_time
            && (ignore_app_version || self.app_version.as_deref() == Some(&binary.app_version))
    }

    /// Whether the host binary version differs from the one recorded at install.
    #[must_use]
    pub fn binary_version_changed(&self, binary: &BinaryIdentity) -> bool {
        self.app_version.as_deref() != Some(binary.app_version.as_str())
    }

    /// Return a copy carrying the binary identity in effect at install time.
    ///
    /// An app version already present on the record is kept: it names the
    /// binary the release targets, which the acquisition side knows better.
    #[must_use]
    pub fn stamped_with(&self, binary: &BinaryIdentity) -> Self {
        let mut stamped = self.clone();
        if stamped.app_version.is_none() {
            stamped.app_version = Some(binary.app_version.clone());
        }
        stamped.binary_modified_time = Some(binary.binary_modified_time.to_string());
        stamped
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label} ({})", self.package_hash),
            None => write!(f, "{}", self.package_hash),
        }
    }
}

/// Identity of the natively installed host binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryIdentity {
    pub app_version: String,
    pub binary_modified_time: i64,
}

impl BinaryIdentity {
    pub fn new(app_version: impl Into<String>, binary_modified_time: i64) -> Self {
        Self {
            app_version: app_version.into(),
            binary_modified_time,
        }
    }
}

impl fmt::Display for BinaryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (built {})", self.app_version, self.binary_modified_time)
    }
}

/// A package known to have failed to boot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpdate {
    pub package_hash: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub deployment_key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    pub failed_at: DateTime<Utc>,
}

impl FailedUpdate {
    /// Capture the identity of a package that failed to confirm itself
    #[must_use]
    pub fn from_record(record: &PackageRecord, failed_at: DateTime<Utc>) -> Self {
        Self {
            package_hash: record.package_hash.clone(),
            app_version: record.app_version.clone(),
            deployment_key: record.deployment_key.clone(),
            label: record.label.clone(),
            failed_at,
        }
    }
}
