//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{FigError, FileError, SessionError};

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &FigError) -> String {
    match e {
        FigError::File(FileError::InvalidJson {
            path,
            line: Some(line),
            message,
        }) => format!(
            "Error: {} is not valid JSON (line {}): {}",
            path.display(),
            line,
            message
        ),
        FigError::File(FileError::PermissionDenied(path)) => format!(
            "Error: permission denied for {}. Check the file's owner and mode.",
            path.display()
        ),
        FigError::Session(SessionError::ConflictPending(path)) => format!(
            "Error: {} changed on disk while editing; nothing was written.",
            path.display()
        ),
        other => format!("Error: {}", other),
    }
}
