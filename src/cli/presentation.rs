//! CLI presentation: text and json formatters per command family.

mod mcp;
mod settings;

pub use mcp::{format_copy_outcome, format_projects, format_server_list};
pub use settings::{format_edit_result, format_merged, format_paths, PathEntry};
