//! Atomic replace and backup rotation.

use crate::error::FileError;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BACKUP_MARKER: &str = ".backup.";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";
const MAX_BACKUP_NAME_ATTEMPTS: u32 = 1000;

fn file_name(path: &Path) -> Result<String, FileError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FileError::WriteFailed {
            path: path.to_path_buf(),
            reason: "path has no file name".to_string(),
        })
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write `contents` to `path` through a sibling temp file and a rename.
///
/// The target is either the old content or the new content, never a mix. Existing
/// file permissions are carried over to the replacement.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), FileError> {
    let name = file_name(path)?;
    let temp_path = parent_dir(path).join(format!(".{}.{}.tmp", name, std::process::id()));

    let staged = (|| -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(&temp_path, meta.permissions())?;
        }
        Ok(())
    })();

    if let Err(e) = staged {
        let _ = fs::remove_file(&temp_path);
        return Err(FileError::WriteFailed {
            path: path.to_path_buf(),
            reason: format!("failed to stage {:?}: {}", temp_path, e),
        });
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        FileError::WriteFailed {
            path: path.to_path_buf(),
            reason: format!("failed to rename temp file into place: {}", e),
        }
    })?;

    debug!(path = %path.display(), bytes = contents.len(), "Atomic write complete");
    Ok(())
}

/// Copy `path` to a fresh `<name>.backup.<timestamp>` sibling.
///
/// Backups are opened with create-new semantics; a name collision within the same
/// millisecond gets a `-N` suffix instead of replacing the earlier backup.
pub fn create_backup(path: &Path) -> Result<PathBuf, FileError> {
    let backup_failed = |reason: String| FileError::BackupFailed {
        path: path.to_path_buf(),
        reason,
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| backup_failed("path has no file name".to_string()))?;
    let stamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
    let base = format!("{}{}{}", name, BACKUP_MARKER, stamp);
    let dir = parent_dir(path);

    for attempt in 0..MAX_BACKUP_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            dir.join(&base)
        } else {
            dir.join(format!("{}-{}", base, attempt))
        };

        let mut dest = match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(backup_failed(format!("cannot create {:?}: {}", candidate, e))),
        };

        let copied = (|| -> io::Result<()> {
            let mut src = File::open(path)?;
            io::copy(&mut src, &mut dest)?;
            dest.sync_all()?;
            Ok(())
        })();

        if let Err(e) = copied {
            let _ = fs::remove_file(&candidate);
            return Err(backup_failed(e.to_string()));
        }

        if let Ok(meta) = fs::metadata(path) {
            if let Err(e) = fs::set_permissions(&candidate, meta.permissions()) {
                warn!(backup = %candidate.display(), error = %e, "Could not copy permissions to backup");
            }
        }

        debug!(path = %path.display(), backup = %candidate.display(), "Backup created");
        return Ok(candidate);
    }

    Err(backup_failed(
        "exhausted unique backup names".to_string(),
    ))
}

/// Orders backup suffixes chronologically: timestamp, then collision counter.
fn backup_sort_key(suffix: &str) -> (String, u32) {
    if let Some((stamp, counter)) = suffix.rsplit_once('-') {
        if let Ok(counter) = counter.parse::<u32>() {
            return (stamp.to_string(), counter);
        }
    }
    (suffix.to_string(), 0)
}

/// Existing backups of `path`, oldest first.
pub fn list_backups(path: &Path) -> Result<Vec<PathBuf>, FileError> {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return Ok(Vec::new()),
    };
    let prefix = format!("{}{}", name, BACKUP_MARKER);
    let dir = parent_dir(path);

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(super::read_error(dir, e)),
    };

    let mut backups: Vec<((String, u32), PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            file_name
                .strip_prefix(&prefix)
                .map(|suffix| (backup_sort_key(suffix), entry.path()))
        })
        .collect();
    backups.sort();
    Ok(backups.into_iter().map(|(_, path)| path).collect())
}

/// Delete the oldest backups of `path` so at most `max_backups` remain.
///
/// `keep` is never deleted. `max_backups == 0` keeps everything. Returns the
/// number of files removed; failures to delete are logged, not raised.
pub fn prune_backups(path: &Path, keep: &Path, max_backups: usize) -> Result<usize, FileError> {
    if max_backups == 0 {
        return Ok(0);
    }

    let others: Vec<PathBuf> = list_backups(path)?
        .into_iter()
        .filter(|p| p != keep)
        .collect();
    let allowed = max_backups.saturating_sub(1);
    if others.len() <= allowed {
        return Ok(0);
    }

    let mut removed = 0;
    for stale in &others[..others.len() - allowed] {
        match fs::remove_file(stale) {
            Ok(()) => removed += 1,
            Err(e) => warn!(backup = %stale.display(), error = %e, "Failed to prune backup"),
        }
    }
    debug!(path = %path.display(), removed, "Pruned old backups");
    Ok(removed)
}
