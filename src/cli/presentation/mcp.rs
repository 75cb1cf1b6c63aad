//! MCP presentation: server lists and copy results.

use crate::error::{ConfigurationError, FigError};
use crate::mcp_copy::CopyOutcome;
use crate::settings::McpServer;
use comfy_table::Table;
use std::collections::BTreeMap;

pub fn format_server_list(
    servers: &BTreeMap<String, McpServer>,
    format: &str,
) -> Result<String, FigError> {
    if format == "json" {
        return serde_json::to_string_pretty(servers)
            .map_err(|e| FigError::Configuration(ConfigurationError::Other(e.to_string())));
    }
    if servers.is_empty() {
        return Ok("No MCP servers defined.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Name", "Transport", "Target"]);
    for (name, server) in servers {
        let target = match (&server.command, &server.url) {
            (Some(command), _) => {
                let args = server.args.as_deref().unwrap_or_default().join(" ");
                format!("{} {}", command, args).trim_end().to_string()
            }
            (None, Some(url)) => url.clone(),
            (None, None) => "-".to_string(),
        };
        table.add_row(vec![name.clone(), server.transport().to_string(), target]);
    }
    Ok(table.to_string())
}

pub fn format_copy_outcome(outcome: &CopyOutcome) -> String {
    match outcome {
        CopyOutcome::Copied { name, destination } => {
            format!("Copied '{}' to {}", name, destination.display())
        }
        CopyOutcome::Overwritten { name, destination } => {
            format!("Replaced '{}' in {}", name, destination.display())
        }
        CopyOutcome::Renamed { name, destination } => format!(
            "Name taken; stored as '{}' in {}",
            name,
            destination.display()
        ),
        CopyOutcome::Skipped { name } => format!(
            "'{}' already exists at the destination; skipped (use --on-conflict overwrite or rename)",
            name
        ),
    }
}

pub fn format_projects(projects: &[String]) -> String {
    if projects.is_empty() {
        return "No projects registered.".to_string();
    }
    projects
        .iter()
        .enumerate()
        .map(|(i, p)| format!("  {}. {}", i + 1, p))
        .collect::<Vec<_>>()
        .join("\n")
}
