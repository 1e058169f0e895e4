//! Durability helpers.
//!
//! Creating, renaming or truncating a file is only durable once both the file
//! and its directory entry have reached disk. These helpers pair the two.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Syncs a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory so that entries created or renamed in it survive a
/// power loss.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    OpenOptions::new().read(true).open(dir_path)?.sync_all()
}

/// Syncs the directory containing `path`, if it has one.
pub fn fsync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fsync_dir(parent),
        _ => Ok(()),
    }
}

/// Truncates the file at `path` to `len` bytes and syncs it.
pub fn truncate_durably(path: &Path, len: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    fsync_file(&file)
}
