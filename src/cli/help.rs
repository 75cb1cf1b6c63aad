//! CLI help and command-name contract for logging.

use crate::cli::parse::{Commands, EnvCommands, McpCommands, RuleCommands, ToolCommands};

/// Command name string for log fields (e.g. "rule.add", "mcp.copy").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Paths { .. } => "paths".to_string(),
        Commands::Show { .. } => "show".to_string(),
        Commands::Rule { command } => format!("rule.{}", rule_command_name(command)),
        Commands::Env { command } => format!("env.{}", env_command_name(command)),
        Commands::Tool { command } => format!("tool.{}", tool_command_name(command)),
        Commands::Mcp { command } => format!("mcp.{}", mcp_command_name(command)),
        Commands::Watch { .. } => "watch".to_string(),
    }
}

pub fn rule_command_name(command: &RuleCommands) -> &'static str {
    match command {
        RuleCommands::Add { .. } => "add",
        RuleCommands::Remove { .. } => "remove",
    }
}

pub fn env_command_name(command: &EnvCommands) -> &'static str {
    match command {
        EnvCommands::Set { .. } => "set",
        EnvCommands::Unset { .. } => "unset",
    }
}

pub fn tool_command_name(command: &ToolCommands) -> &'static str {
    match command {
        ToolCommands::Add { .. } => "add",
        ToolCommands::Remove { .. } => "remove",
    }
}

pub fn mcp_command_name(command: &McpCommands) -> &'static str {
    match command {
        McpCommands::Copy { .. } => "copy",
        McpCommands::List { .. } => "list",
        McpCommands::Projects => "projects",
    }
}

/// Whether the command writes files.
pub fn is_mutating(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Rule { .. }
            | Commands::Env { .. }
            | Commands::Tool { .. }
            | Commands::Mcp {
                command: McpCommands::Copy { .. }
            }
    )
}
