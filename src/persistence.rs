//! Persistence Layer
//!
//! Reads and writes JSON documents at specific paths. Writes back up the previous
//! content, then replace the file atomically. Watch subscriptions report debounced
//! changes made by other writers.

pub mod atomic;
pub mod symlink;
pub mod watch;

use crate::error::FileError;
use crate::settings::ConfigDocument;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use watch::{FileWatcher, WatchCallback, WatchToken};

/// Default debounce window for watch notifications
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default number of backups kept per file
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// Tunables for the file manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceOptions {
    /// Backups kept per file after a write; 0 keeps all
    pub max_backups: usize,
    /// Quiet period before a watch callback fires
    pub debounce: Duration,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            max_backups: DEFAULT_MAX_BACKUPS,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// File that received the bytes (the symlink target when `path` is a link)
    pub written: PathBuf,
    /// Backup of the replaced content, if a file existed
    pub backup: Option<PathBuf>,
}

pub(crate) fn read_error(path: &Path, err: io::Error) -> FileError {
    match err.kind() {
        io::ErrorKind::NotFound => FileError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => FileError::PermissionDenied(path.to_path_buf()),
        _ => FileError::ReadFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        },
    }
}

/// Parse JSON text, mapping parser failures to `InvalidJson` with the line number.
pub fn decode<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T, FileError> {
    serde_json::from_str(text).map_err(|e| {
        let message = e.to_string();
        let message = match message.rfind(" at line ") {
            Some(idx) => message[..idx].to_string(),
            None => message,
        };
        FileError::InvalidJson {
            path: path.to_path_buf(),
            line: (e.line() > 0).then_some(e.line()),
            message,
        }
    })
}

/// Encode as pretty JSON with object keys sorted at every level.
pub fn encode<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = sort_keys(serde_json::to_value(value)?);
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    Ok(text)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Storage seam used by the edit coordinator
pub trait SettingsStore: Send + Sync {
    /// Read a settings document; `None` when the file does not exist.
    fn load(&self, path: &Path) -> Result<Option<ConfigDocument>, FileError>;

    /// Back up and atomically replace the document at `path`.
    fn store(&self, document: &ConfigDocument, path: &Path) -> Result<WriteOutcome, FileError>;

    /// Subscribe to debounced external changes of `path`.
    fn watch(&self, path: &Path, on_change: WatchCallback) -> Result<WatchToken, FileError>;

    /// Drop one subscription.
    fn unwatch(&self, token: &WatchToken);

    /// Arm a subscription whose directory has appeared since it was registered,
    /// without waiting for the watcher to notice.
    fn rearm(&self, _path: &Path) -> Result<(), FileError> {
        Ok(())
    }
}

struct ManagerInner {
    options: PersistenceOptions,
    watcher: FileWatcher,
}

/// File manager for settings, MCP, and registry documents.
///
/// Cheap to clone; clones share one watcher.
#[derive(Clone)]
pub struct ConfigFileManager {
    inner: Arc<ManagerInner>,
}

impl Default for ConfigFileManager {
    fn default() -> Self {
        Self::new(PersistenceOptions::default())
    }
}

impl ConfigFileManager {
    pub fn new(options: PersistenceOptions) -> Self {
        let watcher = FileWatcher::new(options.debounce);
        Self {
            inner: Arc::new(ManagerInner { options, watcher }),
        }
    }

    pub fn options(&self) -> &PersistenceOptions {
        &self.inner.options
    }

    pub fn watcher(&self) -> &FileWatcher {
        &self.inner.watcher
    }

    pub fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Read and decode `path`. A missing file is `Ok(None)`.
    pub fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, FileError> {
        let target = symlink::resolve(path)?;
        let text = match fs::read_to_string(&target) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No file; nothing to read");
                return Ok(None);
            }
            Err(e) => return Err(read_error(path, e)),
        };
        let value = decode(path, &text)?;
        debug!(path = %path.display(), bytes = text.len(), "Read document");
        Ok(Some(value))
    }

    /// Encode and write `value` to `path`.
    ///
    /// Creates parent directories. If the target exists it is backed up first; a
    /// failed backup aborts the write and leaves the target untouched.
    pub fn write<T: Serialize>(&self, value: &T, path: &Path) -> Result<WriteOutcome, FileError> {
        let target = symlink::resolve(path)?;
        let text = encode(value).map_err(|e| FileError::WriteFailed {
            path: path.to_path_buf(),
            reason: format!("failed to encode JSON: {}", e),
        })?;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FileError::WriteFailed {
                path: path.to_path_buf(),
                reason: format!("failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let backup = if target.exists() {
            let backup = atomic::create_backup(&target)?;
            if let Err(e) =
                atomic::prune_backups(&target, &backup, self.inner.options.max_backups)
            {
                warn!(path = %path.display(), error = %e, "Backup pruning failed");
            }
            Some(backup)
        } else {
            None
        };

        atomic::write_atomic(&target, text.as_bytes())?;
        info!(
            path = %path.display(),
            backup = ?backup.as_ref().map(|b| b.display().to_string()),
            "Wrote document"
        );

        Ok(WriteOutcome {
            written: target,
            backup,
        })
    }

    /// [`ConfigFileManager::read`] on the blocking thread pool.
    pub async fn read_async<T>(&self, path: PathBuf) -> Result<Option<T>, FileError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let manager = self.clone();
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || manager.read(&task_path))
            .await
            .map_err(|e| FileError::ReadFailed {
                path,
                reason: format!("background read failed: {}", e),
            })?
    }

    /// [`ConfigFileManager::write`] on the blocking thread pool.
    pub async fn write_async<T>(&self, value: T, path: PathBuf) -> Result<WriteOutcome, FileError>
    where
        T: Serialize + Send + 'static,
    {
        let manager = self.clone();
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || manager.write(&value, &task_path))
            .await
            .map_err(|e| FileError::WriteFailed {
                path,
                reason: format!("background write failed: {}", e),
            })?
    }

    /// Register a debounced change callback for `path`.
    pub fn start_watching<F>(&self, path: &Path, on_change: F) -> Result<WatchToken, FileError>
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.inner.watcher.subscribe(path, Arc::new(on_change))
    }

    /// Remove the subscription identified by `token`.
    pub fn stop_watching(&self, token: &WatchToken) {
        self.inner.watcher.unsubscribe(token);
    }

    pub fn backups(&self, path: &Path) -> Result<Vec<PathBuf>, FileError> {
        let target = symlink::resolve(path)?;
        atomic::list_backups(&target)
    }
}

impl SettingsStore for ConfigFileManager {
    fn load(&self, path: &Path) -> Result<Option<ConfigDocument>, FileError> {
        self.read(path)
    }

    fn store(&self, document: &ConfigDocument, path: &Path) -> Result<WriteOutcome, FileError> {
        self.write(document, path)
    }

    fn watch(&self, path: &Path, on_change: WatchCallback) -> Result<WatchToken, FileError> {
        self.inner.watcher.subscribe(path, on_change)
    }

    fn unwatch(&self, token: &WatchToken) {
        self.inner.watcher.unsubscribe(token);
    }

    fn rearm(&self, path: &Path) -> Result<(), FileError> {
        self.inner.watcher.rearm(path).map(|_| ())
    }
}
