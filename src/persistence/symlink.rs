//! Symlink resolution for settings paths.
//!
//! Settings files are often symlinked from a dotfiles repository. Writes go to the
//! final target so the link itself survives an atomic replace.

use crate::error::FileError;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum number of links followed before giving up, matching the Linux limit.
const MAX_SYMLINK_HOPS: usize = 40;

/// Follow symlinks on the final path component until a non-link (or missing) path.
///
/// A missing path resolves to itself; dangling links resolve to their target.
pub fn resolve(path: &Path) -> Result<PathBuf, FileError> {
    let mut current = path.to_path_buf();
    let mut visited: HashSet<PathBuf> = HashSet::new();

    for _ in 0..MAX_SYMLINK_HOPS {
        let meta = match fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(current),
            Err(e) => return Err(super::read_error(path, e)),
        };

        if !meta.file_type().is_symlink() {
            return Ok(current);
        }

        if !visited.insert(current.clone()) {
            return Err(FileError::CircularSymlink(path.to_path_buf()));
        }

        let target = fs::read_link(&current).map_err(|e| super::read_error(path, e))?;
        current = if target.is_absolute() {
            target
        } else {
            current
                .parent()
                .map(|parent| parent.join(&target))
                .unwrap_or(target)
        };
    }

    Err(FileError::CircularSymlink(path.to_path_buf()))
}
