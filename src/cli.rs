//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{command_name, is_mutating};
pub use output::map_error;
pub use parse::{
    Cli, Commands, EnvCommands, LocationArg, McpCommands, RuleCommands, ToolCommands,
};
pub use presentation::{
    format_copy_outcome, format_edit_result, format_merged, format_paths, format_projects,
    format_server_list, PathEntry,
};
pub use route::RunContext;
