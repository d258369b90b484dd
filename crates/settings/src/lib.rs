#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Durable settings for the ota update client
//!
//! Holds the two records the lifecycle controller persists between launches:
//! the pending update (the crash trap) and the set of updates that failed to
//! confirm. Package files live in `ota-store`, not here.

mod kv;
mod manager;

pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use manager::{SettingsManager, FAILED_UPDATES_KEY, PENDING_UPDATE_KEY};
