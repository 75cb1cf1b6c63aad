//! Debounced, path-keyed file watching.
//!
//! Each subscribed file is observed through a non-recursive watch on its parent
//! directory, so writers that replace the file by rename are still seen. Raw events
//! for a path reset that path's deadline; subscribers are called once the path has
//! been quiet for the debounce window.
//!
//! When the parent directory does not exist yet, the nearest existing ancestor is
//! watched instead. Each event there moves the watch one step closer, and once the
//! parent appears the subscription is armed; a file already present at that point
//! counts as a change.

use crate::error::FileError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Callback invoked with the subscribed path after a debounced change.
pub type WatchCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Handle for one subscription; pass it back to stop watching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchToken {
    path: PathBuf,
    id: u64,
}

impl WatchToken {
    /// Mint a token; stores other than [`FileWatcher`] pick their own ids.
    pub fn new(path: PathBuf, id: u64) -> Self {
        Self { path, id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct Subscription {
    id: u64,
    callback: WatchCallback,
}

struct WatchedPath {
    /// Canonical parent directory joined with the file name, set once armed.
    armed_as: Option<PathBuf>,
    /// Canonical ancestor watched while the parent directory is missing.
    waiting_on: Option<PathBuf>,
    subscriptions: Vec<Subscription>,
}

#[derive(Default)]
struct WatchState {
    paths: HashMap<PathBuf, WatchedPath>,
    /// Canonical directory -> number of paths (armed or waiting) using it.
    directories: HashMap<PathBuf, usize>,
    watcher: Option<RecommendedWatcher>,
}

struct WatchShared {
    state: Mutex<WatchState>,
    next_id: AtomicU64,
    debounce: Duration,
}

/// Multiplexes any number of single-file subscriptions onto one OS watcher.
#[derive(Clone)]
pub struct FileWatcher {
    shared: Arc<WatchShared>,
}

impl FileWatcher {
    pub fn new(debounce: Duration) -> Self {
        Self {
            shared: Arc::new(WatchShared {
                state: Mutex::new(WatchState::default()),
                next_id: AtomicU64::new(1),
                debounce,
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.shared.debounce
    }

    /// Register `callback` for changes to `path`.
    ///
    /// If the parent directory does not exist yet, the closest existing ancestor is
    /// watched and the subscription arms itself once the directory is created.
    pub fn subscribe(&self, path: &Path, callback: WatchCallback) -> Result<WatchToken, FileError> {
        let key = absolute(path);
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);

        let mut state = self.shared.state.lock();
        state
            .paths
            .entry(key.clone())
            .or_insert_with(|| WatchedPath {
                armed_as: None,
                waiting_on: None,
                subscriptions: Vec::new(),
            })
            .subscriptions
            .push(Subscription { id, callback });

        if let Err(e) = self.arm_locked(&mut state, &key) {
            if let Some(emptied) = remove_subscription(&mut state, &key, id) {
                release_path(&mut state, emptied);
            }
            return Err(e);
        }

        debug!(path = %key.display(), id, "Watch subscription added");
        Ok(WatchToken { path: key, id })
    }

    /// Remove one subscription. Other subscriptions on the same path keep firing.
    pub fn unsubscribe(&self, token: &WatchToken) {
        let mut state = self.shared.state.lock();
        let Some(emptied) = remove_subscription(&mut state, &token.path, token.id) else {
            return;
        };
        debug!(path = %token.path.display(), id = token.id, "Watch subscription removed");
        release_path(&mut state, emptied);
    }

    /// Arm subscriptions for `path` whose directory has appeared since they were
    /// registered. Returns whether the path is armed afterwards.
    pub fn rearm(&self, path: &Path) -> Result<bool, FileError> {
        let key = absolute(path);
        let mut state = self.shared.state.lock();
        if !state.paths.contains_key(&key) {
            return Ok(false);
        }
        self.arm_locked(&mut state, &key)
    }

    /// Number of live subscriptions on `path`.
    pub fn subscription_count(&self, path: &Path) -> usize {
        let key = absolute(path);
        self.shared
            .state
            .lock()
            .paths
            .get(&key)
            .map(|w| w.subscriptions.len())
            .unwrap_or(0)
    }

    /// Whether an OS watch currently covers `path`'s own directory.
    pub fn is_armed(&self, path: &Path) -> bool {
        let key = absolute(path);
        self.shared
            .state
            .lock()
            .paths
            .get(&key)
            .map(|w| w.armed_as.is_some())
            .unwrap_or(false)
    }

    /// Arm `key` on its parent directory, or watch the deepest existing ancestor
    /// while the parent is missing. Returns whether `key` is armed.
    fn arm_locked(&self, state: &mut WatchState, key: &Path) -> Result<bool, FileError> {
        let waiting_on = match state.paths.get(key) {
            None => return Ok(false),
            Some(watched) if watched.armed_as.is_some() => return Ok(true),
            Some(watched) => watched.waiting_on.clone(),
        };

        let (Some(dir), Some(name)) = (key.parent(), key.file_name()) else {
            return Err(FileError::WatchFailed {
                path: key.to_path_buf(),
                reason: "path has no parent directory".to_string(),
            });
        };

        // A directory may appear between the existence check and the watch call;
        // loop until the watched ancestor is the deepest one that exists.
        let mut current = waiting_on;
        loop {
            if dir.is_dir() {
                let canonical_dir = canonical(key, dir)?;
                self.acquire_directory(state, &canonical_dir, key)?;
                if let Some(previous) = current.take() {
                    release_directory(state, &previous);
                }
                if let Some(watched) = state.paths.get_mut(key) {
                    watched.armed_as = Some(canonical_dir.join(name));
                    watched.waiting_on = None;
                }
                debug!(path = %key.display(), dir = %canonical_dir.display(), "Watch armed");
                return Ok(true);
            }

            let Some(ancestor) = dir.ancestors().skip(1).find(|a| a.is_dir()) else {
                debug!(path = %key.display(), "No existing ancestor; watch left unarmed");
                return Ok(false);
            };
            let canonical_ancestor = canonical(key, ancestor)?;
            if current.as_deref() == Some(canonical_ancestor.as_path()) {
                return Ok(false);
            }

            self.acquire_directory(state, &canonical_ancestor, key)?;
            if let Some(previous) = current.replace(canonical_ancestor.clone()) {
                release_directory(state, &previous);
            }
            if let Some(watched) = state.paths.get_mut(key) {
                watched.waiting_on = Some(canonical_ancestor.clone());
            }
            debug!(
                path = %key.display(),
                ancestor = %canonical_ancestor.display(),
                "Parent directory missing; watching ancestor"
            );
        }
    }

    fn acquire_directory(
        &self,
        state: &mut WatchState,
        dir: &Path,
        key: &Path,
    ) -> Result<(), FileError> {
        if state.watcher.is_none() {
            state.watcher = Some(self.start_backend(key)?);
        }

        let count = state.directories.entry(dir.to_path_buf()).or_insert(0);
        if *count == 0 {
            if let Some(watcher) = state.watcher.as_mut() {
                if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                    state.directories.remove(dir);
                    return Err(FileError::WatchFailed {
                        path: key.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        if let Some(count) = state.directories.get_mut(dir) {
            *count += 1;
        }
        Ok(())
    }

    fn start_backend(&self, key: &Path) -> Result<RecommendedWatcher, FileError> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(move |res| {
            if let Err(e) = tx.send(res) {
                error!("Error forwarding watch event: {}", e);
            }
        })
        .map_err(|e| FileError::WatchFailed {
            path: key.to_path_buf(),
            reason: format!("failed to create watcher: {}", e),
        })?;

        let shared = Arc::downgrade(&self.shared);
        let debounce = self.shared.debounce;
        std::thread::Builder::new()
            .name("fig-watch-debounce".to_string())
            .spawn(move || run_debouncer(rx, shared, debounce))
            .map_err(|e| FileError::WatchFailed {
                path: key.to_path_buf(),
                reason: format!("failed to spawn debounce thread: {}", e),
            })?;

        Ok(watcher)
    }

    /// Move waiting subscriptions closer to their directories. Returns the paths
    /// that became armed and whose file already exists.
    fn advance_waiting(&self) -> Vec<PathBuf> {
        let mut state = self.shared.state.lock();
        let waiting: Vec<PathBuf> = state
            .paths
            .iter()
            .filter(|(_, w)| w.armed_as.is_none())
            .map(|(key, _)| key.clone())
            .collect();

        let mut appeared = Vec::new();
        for key in waiting {
            match self.arm_locked(&mut state, &key) {
                Ok(true) if key.exists() => appeared.push(key),
                Ok(_) => {}
                Err(e) => warn!(path = %key.display(), error = %e, "Could not arm watch"),
            }
        }
        appeared
    }

    fn has_waiting(&self) -> bool {
        self.shared
            .state
            .lock()
            .paths
            .values()
            .any(|w| w.armed_as.is_none())
    }
}

fn canonical(key: &Path, dir: &Path) -> Result<PathBuf, FileError> {
    dir.canonicalize().map_err(|e| FileError::WatchFailed {
        path: key.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Release the directory held by a path entry that lost its last subscription.
fn release_path(state: &mut WatchState, emptied: WatchedPath) {
    let held = emptied
        .armed_as
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .or(emptied.waiting_on);
    if let Some(dir) = held {
        release_directory(state, &dir);
    }
}

/// Drops the subscription; returns the path entry if it became empty and was removed.
fn remove_subscription(state: &mut WatchState, key: &Path, id: u64) -> Option<WatchedPath> {
    let watched = state.paths.get_mut(key)?;
    watched.subscriptions.retain(|s| s.id != id);
    if watched.subscriptions.is_empty() {
        state.paths.remove(key)
    } else {
        None
    }
}

fn release_directory(state: &mut WatchState, dir: &Path) {
    let Some(count) = state.directories.get_mut(dir) else {
        return;
    };
    *count = count.saturating_sub(1);
    if *count > 0 {
        return;
    }
    state.directories.remove(dir);
    if let Some(watcher) = state.watcher.as_mut() {
        if let Err(e) = watcher.unwatch(dir) {
            debug!(dir = %dir.display(), error = %e, "Unwatch failed");
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn is_content_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

/// Canonical form of an event path: canonical parent joined with the file name.
fn canonical_event_path(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

impl WatchShared {
    fn match_event_path(&self, path: &Path) -> Option<PathBuf> {
        let canonical = canonical_event_path(path);
        let state = self.state.lock();
        state
            .paths
            .iter()
            .find(|(key, w)| {
                w.armed_as.as_deref() == Some(canonical.as_path()) || key.as_path() == path
            })
            .map(|(key, _)| key.clone())
    }

    fn callbacks_for(&self, key: &Path) -> Vec<WatchCallback> {
        let state = self.state.lock();
        state
            .paths
            .get(key)
            .map(|w| w.subscriptions.iter().map(|s| Arc::clone(&s.callback)).collect())
            .unwrap_or_default()
    }
}

fn run_debouncer(
    rx: Receiver<notify::Result<Event>>,
    shared: Weak<WatchShared>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        let received = match pending.values().min() {
            Some(deadline) => {
                rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(event)) => {
                if is_content_event(&event.kind) {
                    let Some(shared) = shared.upgrade() else {
                        break;
                    };
                    for path in &event.paths {
                        if let Some(key) = shared.match_event_path(path) {
                            pending.insert(key, Instant::now() + debounce);
                        }
                    }

                    let watcher = FileWatcher { shared };
                    if watcher.has_waiting() {
                        for key in watcher.advance_waiting() {
                            debug!(path = %key.display(), "Watched file appeared with its directory");
                            pending.insert(key, Instant::now() + debounce);
                        }
                    }
                }
            }
            Ok(Err(e)) => warn!("Watch error: {}", e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Watcher channel closed; debounce thread exiting");
                break;
            }
        }

        let now = Instant::now();
        let due: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        if due.is_empty() {
            continue;
        }

        let Some(shared) = shared.upgrade() else {
            break;
        };
        for path in due {
            pending.remove(&path);
            let callbacks = shared.callbacks_for(&path);
            debug!(path = %path.display(), subscribers = callbacks.len(), "Debounced change");
            for callback in callbacks {
                callback(&path);
            }
        }
    }
}
