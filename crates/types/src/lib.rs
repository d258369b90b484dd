#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the ota update client
//!
//! This crate provides the typed records that are persisted by the settings
//! and package stores, plus the values the lifecycle controller hands back to
//! the host runtime.

pub mod package;
pub mod state;

// Re-export commonly used types
pub use package::{BinaryIdentity, FailedUpdate, PackageRecord};
pub use state::{BootTarget, LifecycleStatus, PendingUpdate};

use serde::{Deserialize, Serialize};

/// Output format for the host simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

impl clap::ValueEnum for OutputFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Plain, Self::Json]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Plain => clap::builder::PossibleValue::new("plain"),
            Self::Json => clap::builder::PossibleValue::new("json"),
        })
    }
}
