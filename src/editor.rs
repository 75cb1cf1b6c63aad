//! Edit/Conflict Coordinator
//!
//! A [`SettingsEditor`] edits one settings file. It keeps the document as last read
//! from disk (the baseline) next to the edited copy, records every mutation as an
//! undoable command, and watches the file so changes made by other writers either
//! reload silently (no local edits) or surface as a conflict (local edits pending).

pub mod command;
pub mod validation;

use crate::error::{FigError, FileError, SessionError, ValidationError};
use crate::persistence::{SettingsStore, WatchCallback, WatchToken, WriteOutcome};
use crate::settings::{
    Attribution, ConfigDocument, ConfigPaths, ConfigSource, HookGroup, PermissionKind,
};
use command::{EditCommand, History, Prune};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Lifecycle of an editing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Clean,
    Dirty,
    ExternalChangeDetected { path: PathBuf },
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Loading => write!(f, "loading"),
            SessionState::Clean => write!(f, "clean"),
            SessionState::Dirty => write!(f, "dirty"),
            SessionState::ExternalChangeDetected { path } => {
                write!(f, "external change detected ({})", path.display())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictState {
    Clean,
    ExternalChangePending(PathBuf),
}

/// How to settle a pending external change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep in-memory edits, now measured against the changed disk copy
    KeepLocal,
    /// Drop in-memory edits and reload from disk
    UseExternal,
}

/// Notifications published by an editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The file changed on disk and was reloaded without local edits being lost
    Reloaded { path: PathBuf },
    ExternalChangeDetected { path: PathBuf },
    Saved {
        path: PathBuf,
        backup: Option<PathBuf>,
    },
    ConflictResolved {
        path: PathBuf,
        resolution: Resolution,
    },
}

/// The file an editor works on and the layer it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTarget {
    pub source: ConfigSource,
    pub path: PathBuf,
}

impl EditTarget {
    pub fn new(source: ConfigSource, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }

    /// Target for `source` under `paths`; `None` for project layers without a project.
    pub fn for_source(source: ConfigSource, paths: &ConfigPaths) -> Option<Self> {
        source.path(paths).map(|path| Self::new(source, path))
    }
}

struct EditSession {
    target: EditTarget,
    state: SessionState,
    original: ConfigDocument,
    edited: ConfigDocument,
    history: History,
    token: Option<WatchToken>,
}

impl EditSession {
    fn ensure_loaded(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Loading => Err(SessionError::NotLoaded),
            _ => Ok(()),
        }
    }

    fn ensure_saveable(&self) -> Result<(), SessionError> {
        match &self.state {
            SessionState::Loading => Err(SessionError::NotLoaded),
            SessionState::Clean => Err(SessionError::NotDirty),
            SessionState::ExternalChangeDetected { path } => {
                Err(SessionError::ConflictPending(path.clone()))
            }
            SessionState::Dirty => Ok(()),
        }
    }

    /// Recompute Clean/Dirty after an edit. A pending conflict stays pending.
    fn refresh_dirty(&mut self) {
        if matches!(self.state, SessionState::ExternalChangeDetected { .. }) {
            return;
        }
        self.state = if self.edited != self.original {
            SessionState::Dirty
        } else {
            SessionState::Clean
        };
    }

    fn reset_to(&mut self, document: ConfigDocument) {
        self.original = document.clone();
        self.edited = document;
        self.history.clear();
        self.state = SessionState::Clean;
    }
}

/// Coordinates edits, saves, and external changes for a single settings file.
pub struct SettingsEditor {
    session: Arc<Mutex<EditSession>>,
    store: Arc<dyn SettingsStore>,
    events: broadcast::Sender<EditorEvent>,
}

impl SettingsEditor {
    /// Create an editor in the `Loading` state. Nothing is read until
    /// [`SettingsEditor::load_settings`].
    pub fn open(target: EditTarget, store: Arc<dyn SettingsStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            session: Arc::new(Mutex::new(EditSession {
                target,
                state: SessionState::Loading,
                original: ConfigDocument::default(),
                edited: ConfigDocument::default(),
                history: History::default(),
                token: None,
            })),
            store,
            events,
        }
    }

    /// [`SettingsEditor::open`] followed by [`SettingsEditor::load_settings`].
    pub fn load(target: EditTarget, store: Arc<dyn SettingsStore>) -> Result<Self, FigError> {
        let editor = Self::open(target, store);
        editor.load_settings()?;
        Ok(editor)
    }

    /// Receive session notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    /// Read the target from disk and start watching it.
    ///
    /// A missing file loads as an empty document. Reloading discards edits and history.
    pub fn load_settings(&self) -> Result<(), FigError> {
        let mut session = self.session.lock();
        let path = self.ensure_watching(&mut session)?;
        let document = self.store.load(&path)?.unwrap_or_default();
        session.reset_to(document);
        info!(path = %path.display(), source = %session.target.source, "Loaded settings");
        Ok(())
    }

    /// [`SettingsEditor::load_settings`] with the read on the blocking thread pool.
    pub async fn load_settings_async(&self) -> Result<(), FigError> {
        let path = {
            let mut session = self.session.lock();
            self.ensure_watching(&mut session)?
        };

        let store = Arc::clone(&self.store);
        let task_path = path.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load(&task_path))
            .await
            .map_err(|e| FileError::ReadFailed {
                path: path.clone(),
                reason: format!("background read failed: {}", e),
            })?;
        let document = loaded?.unwrap_or_default();

        let mut session = self.session.lock();
        session.reset_to(document);
        info!(path = %path.display(), source = %session.target.source, "Loaded settings");
        Ok(())
    }

    /// Register the watch once; returns the target path.
    fn ensure_watching(&self, session: &mut EditSession) -> Result<PathBuf, FigError> {
        let path = session.target.path.clone();
        if session.token.is_none() {
            let token = self.store.watch(&path, self.watch_callback())?;
            session.token = Some(token);
        }
        Ok(path)
    }

    pub fn add_rule(&self, kind: PermissionKind, rule: &str) -> Result<(), FigError> {
        self.edit(|doc| {
            let rule = validation::validate_new_rule(doc, kind, rule)?;
            Ok(Some(EditCommand::InsertRule {
                kind,
                index: None,
                rule,
            }))
        })
    }

    pub fn remove_rule(&self, kind: PermissionKind, rule: &str) -> Result<(), FigError> {
        self.edit(|doc| {
            let rule = rule.trim();
            let index = doc
                .rules(kind)
                .iter()
                .position(|r| r == rule)
                .ok_or_else(|| ValidationError::RuleNotFound {
                    rule: rule.to_string(),
                    kind: kind.to_string(),
                })?;
            Ok(Some(EditCommand::RemoveRule {
                kind,
                index,
                rule: rule.to_string(),
                prune: Prune::Nothing,
            }))
        })
    }

    /// Replace the text of an existing rule in place.
    pub fn update_rule(&self, kind: PermissionKind, from: &str, to: &str) -> Result<(), FigError> {
        self.edit(|doc| {
            let from = from.trim();
            let rules = doc.rules(kind);
            let index = rules.iter().position(|r| r == from).ok_or_else(|| {
                ValidationError::RuleNotFound {
                    rule: from.to_string(),
                    kind: kind.to_string(),
                }
            })?;
            let to = validation::validate_rule(to)?;
            if to == from {
                return Ok(None);
            }
            if rules.iter().any(|r| *r == to) {
                return Err(ValidationError::DuplicateRule {
                    rule: to,
                    kind: kind.to_string(),
                });
            }
            Ok(Some(EditCommand::ReplaceRule {
                kind,
                index,
                from: from.to_string(),
                to,
            }))
        })
    }

    /// Set an environment variable, inserting it if absent.
    pub fn update_env_var(&self, key: &str, value: &str) -> Result<(), FigError> {
        self.edit(|doc| {
            let key = validation::validate_env_key(key)?;
            if doc.env_var(&key) == Some(value) {
                return Ok(None);
            }
            Ok(Some(EditCommand::SetEnv {
                key,
                value: Some(value.to_string()),
                prune: Prune::Nothing,
            }))
        })
    }

    pub fn remove_env_var(&self, key: &str) -> Result<(), FigError> {
        self.edit(|doc| {
            let key = validation::validate_env_key(key)?;
            if doc.env_var(&key).is_none() {
                return Err(ValidationError::EnvVarNotFound(key));
            }
            Ok(Some(EditCommand::SetEnv {
                key,
                value: None,
                prune: Prune::Nothing,
            }))
        })
    }

    pub fn add_disallowed_tool(&self, name: &str) -> Result<(), FigError> {
        self.edit(|doc| {
            let tool = validation::validate_tool_name(name)?;
            if doc.disallowed_tools().contains(&tool) {
                return Err(ValidationError::DuplicateTool(tool));
            }
            Ok(Some(EditCommand::InsertTool { index: None, tool }))
        })
    }

    pub fn remove_disallowed_tool(&self, name: &str) -> Result<(), FigError> {
        self.edit(|doc| {
            let tool = name.trim();
            let index = doc
                .disallowed_tools()
                .iter()
                .position(|t| t == tool)
                .ok_or_else(|| ValidationError::ToolNotFound(tool.to_string()))?;
            Ok(Some(EditCommand::RemoveTool {
                index,
                tool: tool.to_string(),
                prune: Prune::Nothing,
            }))
        })
    }

    /// Append a hook group to `event`.
    pub fn add_hook_group(&self, event: &str, group: HookGroup) -> Result<(), FigError> {
        self.edit(|_| {
            Ok(Some(EditCommand::InsertHookGroup {
                event: event.trim().to_string(),
                index: None,
                group,
            }))
        })
    }

    pub fn remove_hook_group(&self, event: &str, index: usize) -> Result<(), FigError> {
        self.edit(|doc| {
            let event = event.trim();
            if index >= doc.hook_groups(event).len() {
                return Err(ValidationError::HookGroupNotFound {
                    event: event.to_string(),
                    index,
                });
            }
            Ok(Some(EditCommand::RemoveHookGroup {
                event: event.to_string(),
                index,
                prune: Prune::Nothing,
            }))
        })
    }

    /// Replace the attribution section; `None` removes it.
    pub fn set_attribution(&self, attribution: Option<Attribution>) -> Result<(), FigError> {
        self.edit(|doc| {
            if doc.attribution == attribution {
                return Ok(None);
            }
            Ok(Some(EditCommand::SetAttribution { value: attribution }))
        })
    }

    /// Build a command against the edited document and apply it. A builder returning
    /// `None` means the edit would change nothing.
    fn edit<F>(&self, build: F) -> Result<(), FigError>
    where
        F: FnOnce(&ConfigDocument) -> Result<Option<EditCommand>, ValidationError>,
    {
        let mut session = self.session.lock();
        session.ensure_loaded()?;

        let Some(command) = build(&session.edited)? else {
            return Ok(());
        };

        let EditSession {
            history, edited, ..
        } = &mut *session;
        history.execute(&command, edited)?;
        session.refresh_dirty();
        debug!(edit = %command.describe(), state = %session.state, "Applied edit");
        Ok(())
    }

    /// Revert the most recent edit; returns its description.
    pub fn undo(&self) -> Result<String, FigError> {
        let mut session = self.session.lock();
        session.ensure_loaded()?;
        let EditSession {
            history, edited, ..
        } = &mut *session;
        let description = history.undo(edited)?.ok_or(SessionError::NothingToUndo)?;
        session.refresh_dirty();
        debug!(edit = %description, "Undid edit");
        Ok(description)
    }

    /// Re-apply the most recently undone edit; returns its description.
    pub fn redo(&self) -> Result<String, FigError> {
        let mut session = self.session.lock();
        session.ensure_loaded()?;
        let EditSession {
            history, edited, ..
        } = &mut *session;
        let description = history.redo(edited)?.ok_or(SessionError::NothingToRedo)?;
        session.refresh_dirty();
        debug!(edit = %description, "Redid edit");
        Ok(description)
    }

    /// Write the edited document. Only valid while `Dirty`.
    ///
    /// On failure the session stays `Dirty` with edits intact.
    pub fn save(&self) -> Result<WriteOutcome, FigError> {
        let mut session = self.session.lock();
        session.ensure_saveable()?;

        let path = session.target.path.clone();
        let outcome = self.store.store(&session.edited, &path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Save failed");
            e
        })?;

        let saved = session.edited.clone();
        self.finish_save(&mut session, saved, path, &outcome);
        Ok(outcome)
    }

    /// [`SettingsEditor::save`] with the write on the blocking thread pool.
    ///
    /// The session lock is not held during the write. Edits made meanwhile stay
    /// pending and leave the session `Dirty`.
    pub async fn save_async(&self) -> Result<WriteOutcome, FigError> {
        let (document, path) = {
            let session = self.session.lock();
            session.ensure_saveable()?;
            (session.edited.clone(), session.target.path.clone())
        };

        let store = Arc::clone(&self.store);
        let written = document.clone();
        let task_path = path.clone();
        let stored = tokio::task::spawn_blocking(move || store.store(&written, &task_path))
            .await
            .map_err(|e| FileError::WriteFailed {
                path: path.clone(),
                reason: format!("background write failed: {}", e),
            })?;
        let outcome = stored.map_err(|e| {
            warn!(path = %path.display(), error = %e, "Save failed");
            e
        })?;

        let mut session = self.session.lock();
        self.finish_save(&mut session, document, path, &outcome);
        Ok(outcome)
    }

    fn finish_save(
        &self,
        session: &mut EditSession,
        saved: ConfigDocument,
        path: PathBuf,
        outcome: &WriteOutcome,
    ) {
        session.original = saved;
        session.refresh_dirty();

        // The first save may have created the directory the watch was waiting for.
        if let Err(e) = self.store.rearm(&path) {
            warn!(path = %path.display(), error = %e, "Could not arm watch after save");
        }

        info!(path = %path.display(), state = %session.state, "Saved settings");
        let _ = self.events.send(EditorEvent::Saved {
            path,
            backup: outcome.backup.clone(),
        });
    }

    /// Settle a pending external change.
    pub fn resolve_conflict(&self, resolution: Resolution) -> Result<(), FigError> {
        let mut session = self.session.lock();
        if !matches!(session.state, SessionState::ExternalChangeDetected { .. }) {
            return Err(SessionError::NoConflict.into());
        }

        let path = session.target.path.clone();
        let on_disk = self.store.load(&path)?.unwrap_or_default();
        match resolution {
            Resolution::UseExternal => session.reset_to(on_disk),
            Resolution::KeepLocal => {
                // Leave the conflict state, then compare edits against the disk copy.
                session.original = on_disk;
                session.state = SessionState::Dirty;
                session.refresh_dirty();
            }
        }

        info!(path = %path.display(), ?resolution, "Resolved external change");
        let _ = self
            .events
            .send(EditorEvent::ConflictResolved { path, resolution });
        Ok(())
    }

    /// Stop watching the target. Called on drop.
    pub fn close(&self) {
        let token = self.session.lock().token.take();
        if let Some(token) = token {
            self.store.unwatch(&token);
            debug!(path = %token.path().display(), "Closed editor");
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().state.clone()
    }

    pub fn is_dirty(&self) -> bool {
        let session = self.session.lock();
        session.state != SessionState::Loading && session.edited != session.original
    }

    pub fn conflict_state(&self) -> ConflictState {
        match &self.session.lock().state {
            SessionState::ExternalChangeDetected { path } => {
                ConflictState::ExternalChangePending(path.clone())
            }
            _ => ConflictState::Clean,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.session.lock().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.lock().history.can_redo()
    }

    /// Copy of the edited document
    pub fn document(&self) -> ConfigDocument {
        self.session.lock().edited.clone()
    }

    /// Copy of the baseline last read from or written to disk
    pub fn baseline(&self) -> ConfigDocument {
        self.session.lock().original.clone()
    }

    pub fn target(&self) -> EditTarget {
        self.session.lock().target.clone()
    }

    fn watch_callback(&self) -> WatchCallback {
        let session = Arc::downgrade(&self.session);
        let store = Arc::downgrade(&self.store);
        let events = self.events.clone();
        Arc::new(move |path: &Path| {
            handle_external_change(&session, &store, &events, path);
        })
    }
}

impl Drop for SettingsEditor {
    fn drop(&mut self) {
        self.close();
    }
}

/// React to a debounced change of the watched file.
fn handle_external_change(
    session: &Weak<Mutex<EditSession>>,
    store: &Weak<dyn SettingsStore>,
    events: &broadcast::Sender<EditorEvent>,
    changed: &Path,
) {
    let (Some(session), Some(store)) = (session.upgrade(), store.upgrade()) else {
        return;
    };

    // Read before locking so edits are not blocked on disk I/O.
    let target = session.lock().target.path.clone();
    let on_disk = match store.load(&target) {
        Ok(document) => document.unwrap_or_default(),
        Err(FileError::InvalidJson { line, message, .. }) => {
            warn!(path = %target.display(), ?line, %message, "Ignoring unparsable external change");
            return;
        }
        Err(e) => {
            warn!(path = %target.display(), error = %e, "Failed to read external change");
            return;
        }
    };

    let mut session = session.lock();
    if on_disk == session.original {
        debug!(path = %changed.display(), "Disk matches baseline; ignoring notification");
        return;
    }

    match session.state {
        SessionState::Loading => {}
        SessionState::Clean => {
            session.reset_to(on_disk);
            info!(path = %target.display(), "Reloaded settings after external change");
            let _ = events.send(EditorEvent::Reloaded { path: target });
        }
        SessionState::Dirty | SessionState::ExternalChangeDetected { .. } => {
            session.state = SessionState::ExternalChangeDetected {
                path: target.clone(),
            };
            warn!(path = %target.display(), "External change conflicts with unsaved edits");
            let _ = events.send(EditorEvent::ExternalChangeDetected { path: target });
        }
    }
}
