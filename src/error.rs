//! Error types for the Fig settings core.

use std::path::PathBuf;
use thiserror::Error;

/// File-level errors raised by the persistence layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Invalid JSON in {path}{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    InvalidJson {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    #[error("Failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Failed to back up {path}: {reason}")]
    BackupFailed { path: PathBuf, reason: String },

    #[error("Circular symlink: {0}")]
    CircularSymlink(PathBuf),

    #[error("Failed to watch {path}: {reason}")]
    WatchFailed { path: PathBuf, reason: String },
}

impl FileError {
    /// Path the error refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            FileError::NotFound(p)
            | FileError::PermissionDenied(p)
            | FileError::CircularSymlink(p) => p,
            FileError::InvalidJson { path, .. }
            | FileError::ReadFailed { path, .. }
            | FileError::WriteFailed { path, .. }
            | FileError::BackupFailed { path, .. }
            | FileError::WatchFailed { path, .. } => path,
        }
    }
}

/// Errors in Fig's own configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing required key: {0}")]
    MissingRequiredKey(String),

    #[error("Invalid value type for '{key}': expected {expected}")]
    InvalidValueType { key: String, expected: String },

    #[error("Configuration error: {0}")]
    Other(String),
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigurationError::MissingRequiredKey(key),
            config::ConfigError::Type {
                key, expected, ..
            } => ConfigurationError::InvalidValueType {
                key: key.unwrap_or_default(),
                expected: expected.to_string(),
            },
            other => ConfigurationError::Other(other.to_string()),
        }
    }
}

/// Edit rejected before it reaches the document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Rule cannot be empty")]
    EmptyRule,

    #[error("Invalid rule format: '{0}' (expected Tool or Tool(specifier))")]
    InvalidRuleFormat(String),

    #[error("Rule '{rule}' already exists in {kind} list")]
    DuplicateRule { rule: String, kind: String },

    #[error("Rule '{rule}' not found in {kind} list")]
    RuleNotFound { rule: String, kind: String },

    #[error("Environment variable name cannot be empty")]
    EmptyEnvKey,

    #[error("Invalid environment variable name: '{0}'")]
    InvalidEnvKey(String),

    #[error("Environment variable '{0}' is not set")]
    EnvVarNotFound(String),

    #[error("Invalid tool name: '{0}'")]
    InvalidToolName(String),

    #[error("Tool '{0}' is already disallowed")]
    DuplicateTool(String),

    #[error("Tool '{0}' is not in the disallowed list")]
    ToolNotFound(String),

    #[error("No hook group {index} for event '{event}'")]
    HookGroupNotFound { event: String, index: usize },
}

/// Edit session state-machine violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Settings have not been loaded")]
    NotLoaded,

    #[error("No unsaved changes")]
    NotDirty,

    #[error("External change to {0} must be resolved before saving")]
    ConflictPending(PathBuf),

    #[error("No external change is pending")]
    NoConflict,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

/// MCP copy failures that are not file errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McpCopyError {
    #[error("MCP server '{0}' not found")]
    ServerNotFound(String),

    #[error("Source and destination are the same location")]
    SameLocation,

    #[error("No project directory given for a project location")]
    NoProject,
}

/// Top-level error for Fig operations
#[derive(Debug, Error)]
pub enum FigError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    McpCopy(#[from] McpCopyError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for FigError {
    fn from(err: config::ConfigError) -> Self {
        FigError::Configuration(err.into())
    }
}
