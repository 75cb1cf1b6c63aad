//! Fig: Layered Settings Management
//!
//! Reads the global, project-shared, and project-local Claude settings files, merges
//! them with per-value provenance, and edits them safely: atomic writes with backups,
//! debounced watching for external changes, and undoable edit sessions.

pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod layers;
pub mod logging;
pub mod mcp_copy;
pub mod merge;
pub mod persistence;
pub mod settings;

pub use editor::{EditTarget, EditorEvent, Resolution, SessionState, SettingsEditor};
pub use error::FigError;
pub use merge::{merge, merge_layers, MergedConfig, MergedValue};
pub use persistence::{ConfigFileManager, PersistenceOptions, SettingsStore};
pub use settings::{ConfigDocument, ConfigPaths, ConfigSource};
