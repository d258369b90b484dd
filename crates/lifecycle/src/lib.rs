#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Update lifecycle for the ota client
//!
//! Decides which bundle each launch runs and guarantees that an update which
//! never confirms itself is rolled back on the following launch. Packages
//! installed against a different host binary are never booted.
//!
//! [`BundleSelector`] is the facade the host runtime talks to;
//! [`LifecycleController`] holds the state machine behind it.

mod controller;
mod options;
mod selector;

pub use controller::{LifecycleController, Resolution};
pub use options::LifecycleOptions;
pub use selector::{BundleSelector, LaunchState};
