//! CLI parse: clap types for Fig. No behavior; definitions only.

use crate::mcp_copy::CopyConflictPolicy;
use crate::settings::ConfigSource;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fig CLI - layered Claude settings with provenance and safe writes
#[derive(Parser)]
#[command(name = "fig")]
#[command(about = "Inspect and edit layered Claude settings files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory
    #[arg(long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Directory to use in place of the home directory
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every settings file location and whether it exists
    Paths {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the merged configuration with the source of each value
    Show {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Add or remove permission rules
    Rule {
        #[command(subcommand)]
        command: RuleCommands,
    },
    /// Set or unset environment variables
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },
    /// Manage disallowed tools
    Tool {
        #[command(subcommand)]
        command: ToolCommands,
    },
    /// MCP server definitions
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
    /// Print change notifications for settings files until interrupted
    Watch {
        /// Watch only this layer (global, shared, local)
        #[arg(long)]
        source: Option<ConfigSource>,
        /// Debounce window in milliseconds (defaults to watch.debounce_ms)
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// Stop after this many notifications
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum RuleCommands {
    /// Add a permission rule such as `Bash(npm run test:*)`
    Add {
        rule: String,
        /// Add to the deny list instead of allow
        #[arg(long)]
        deny: bool,
        /// Layer to edit (global, shared, local)
        #[arg(long, default_value = "local")]
        source: ConfigSource,
    },
    /// Remove a permission rule
    Remove {
        rule: String,
        #[arg(long)]
        deny: bool,
        #[arg(long, default_value = "local")]
        source: ConfigSource,
    },
}

#[derive(Subcommand)]
pub enum EnvCommands {
    /// Set an environment variable
    Set {
        key: String,
        value: String,
        #[arg(long, default_value = "local")]
        source: ConfigSource,
    },
    /// Remove an environment variable
    Unset {
        key: String,
        #[arg(long, default_value = "local")]
        source: ConfigSource,
    },
}

#[derive(Subcommand)]
pub enum ToolCommands {
    /// Disallow a tool
    Add {
        name: String,
        #[arg(long, default_value = "local")]
        source: ConfigSource,
    },
    /// Allow a previously disallowed tool again
    Remove {
        name: String,
        #[arg(long, default_value = "local")]
        source: ConfigSource,
    },
}

/// Where an MCP server map lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LocationArg {
    /// ~/.claude.json
    Global,
    /// <project>/.mcp.json
    Project,
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// Copy a server definition between the global registry and the project
    Copy {
        name: String,
        #[arg(long, value_enum)]
        from: LocationArg,
        #[arg(long, value_enum)]
        to: LocationArg,
        /// What to do if the name exists at the destination (skip, overwrite, rename)
        #[arg(long, default_value = "skip")]
        on_conflict: CopyConflictPolicy,
    },
    /// List server definitions at a location
    List {
        #[arg(long, value_enum, default_value = "project")]
        location: LocationArg,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List projects recorded in ~/.claude.json
    Projects,
}
