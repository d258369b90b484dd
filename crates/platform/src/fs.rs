#![allow(clippy::module_name_repetitions)]

//! Filesystem convenience helpers.
//!
//! Every helper returns `ota_errors::Error` with the offending path attached,
//! and every write helper is durable on return: data is synced before the
//! rename that publishes it, and the parent directory is synced after.

use ota_errors::{Error, StorageError};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, Error>;

fn storage_err(err: &std::io::Error, path: &Path) -> Error {
    StorageError::from_io_with_path(err, path).into()
}

/// Check whether a path exists
#[must_use]
pub fn exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

/// Create a directory and all of its parents
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| storage_err(&e, path))
}

/// Remove a directory tree; a missing directory is not an error
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_err(&e, path)),
    }
}

/// Remove a file; a missing file is not an error
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(storage_err(&e, path)),
    }
}

/// Sync a directory so renames and unlinks inside it survive power loss
///
/// # Errors
///
/// Returns an error if the directory cannot be opened or synced.
pub fn fsync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|file| file.sync_all())
        .map_err(|e| storage_err(&e, dir))
}

/// Atomically replace `path` with `contents`.
///
/// The bytes go to a temporary file next to the target, which is synced and
/// renamed over it. Readers see either the old or the new contents.
///
/// # Errors
///
/// Returns an error if any step of the write, sync or rename fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| StorageError::InvalidPath {
        path: path.display().to_string(),
    })?;
    create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| storage_err(&e, parent))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| storage_err(&e, tmp.path()))?;
    tmp.persist(path)
        .map_err(|e| StorageError::AtomicRenameFailed {
            message: format!("{}: {}", path.display(), e.error),
        })?;
    fsync_dir(parent)
}

/// Rename `src` to `dst` and sync the destination's parent
///
/// # Errors
///
/// Returns `AtomicRenameFailed` if the rename fails.
pub fn atomic_rename(src: &Path, dst: &Path) -> Result<()> {
    fs::rename(src, dst).map_err(|e| StorageError::AtomicRenameFailed {
        message: format!("{} -> {}: {e}", src.display(), dst.display()),
    })?;
    match dst.parent() {
        Some(parent) => fsync_dir(parent),
        None => Ok(()),
    }
}

/// Recursively copy a directory, syncing every copied file.
///
/// Symlinks are followed and copied as regular files.
///
/// # Errors
///
/// Returns an error if `src` is not a directory or any copy fails.
pub fn copy_directory(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        return Err(StorageError::PathNotFound {
            path: src.display().to_string(),
        }
        .into());
    }
    create_dir_all(dst)?;

    for entry in fs::read_dir(src).map_err(|e| storage_err(&e, src))? {
        let entry = entry.map_err(|e| storage_err(&e, src))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if from.is_dir() {
            copy_directory(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| storage_err(&e, &from))?;
            File::open(&to)
                .and_then(|file| file.sync_all())
                .map_err(|e| storage_err(&e, &to))?;
        }
    }

    fsync_dir(dst)
}
