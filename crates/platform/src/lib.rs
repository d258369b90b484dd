#![deny(clippy::pedantic, unsafe_code)]

//! Platform layer for the ota update client.
//!
//! This crate provides:
//! - Durable filesystem helpers (atomic replace, directory sync, recursive copy)
//! - Sources for the host binary's identity (version string and build time)

pub mod fs;
mod identity;

pub use identity::{
    parse_build_time, AppVersionOverride, BinaryIdentitySource, BuildInfoFile,
    StaticBinaryIdentity,
};
