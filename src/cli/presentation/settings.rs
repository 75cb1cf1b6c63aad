//! Settings presentation: paths, merged view, and edit results.

use crate::editor::EditTarget;
use crate::error::FigError;
use crate::merge::MergedConfig;
use crate::persistence::WriteOutcome;
use comfy_table::Table;
use serde::Serialize;
use std::path::PathBuf;

/// One row of `fig paths`
#[derive(Debug, Clone, Serialize)]
pub struct PathEntry {
    pub kind: String,
    pub path: PathBuf,
    pub exists: bool,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, FigError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| FigError::Configuration(crate::error::ConfigurationError::Other(e.to_string())))
}

pub fn format_paths(entries: &[PathEntry], format: &str) -> Result<String, FigError> {
    if format == "json" {
        return to_json(&entries);
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["File", "Path", "Exists"]);
    for entry in entries {
        table.add_row(vec![
            entry.kind.clone(),
            entry.path.display().to_string(),
            if entry.exists { "yes" } else { "no" }.to_string(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_merged(merged: &MergedConfig, format: &str) -> Result<String, FigError> {
    if format == "json" {
        return to_json(merged);
    }
    if merged.is_empty() {
        return Ok("No settings found in any layer.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Section", "Value", "Source"]);

    for rule in &merged.permissions.allow {
        table.add_row(vec!["allow".to_string(), rule.value.clone(), rule.source.to_string()]);
    }
    for rule in &merged.permissions.deny {
        table.add_row(vec!["deny".to_string(), rule.value.clone(), rule.source.to_string()]);
    }
    for (key, value) in &merged.env {
        table.add_row(vec![
            "env".to_string(),
            format!("{}={}", key, value.value),
            value.source.to_string(),
        ]);
    }
    for (event, groups) in &merged.hooks {
        for group in groups {
            let matcher = group.value.matcher.as_deref().unwrap_or("*");
            table.add_row(vec![
                format!("hooks.{}", event),
                format!("{} ({} hooks)", matcher, group.value.definitions().len()),
                group.source.to_string(),
            ]);
        }
    }
    for tool in &merged.disallowed_tools {
        table.add_row(vec![
            "disallowedTools".to_string(),
            tool.value.clone(),
            tool.source.to_string(),
        ]);
    }
    if let Some(attribution) = &merged.attribution {
        let describe = |flag: Option<bool>| match flag {
            Some(true) => "on",
            Some(false) => "off",
            None => "unset",
        };
        table.add_row(vec![
            "attribution".to_string(),
            format!(
                "commits {}, pull requests {}",
                describe(attribution.value.commits),
                describe(attribution.value.pull_requests)
            ),
            attribution.source.to_string(),
        ]);
    }
    Ok(table.to_string())
}

/// Summary line(s) after an edit was saved.
pub fn format_edit_result(action: &str, target: &EditTarget, outcome: Option<&WriteOutcome>) -> String {
    match outcome {
        None => format!(
            "No changes: {} already applied to {} ({})",
            action,
            target.source,
            target.path.display()
        ),
        Some(outcome) => {
            let mut s = format!(
                "{} in {} ({})",
                action,
                target.source,
                outcome.written.display()
            );
            if let Some(backup) = &outcome.backup {
                s.push_str(&format!("\nBackup: {}", backup.display()));
            }
            s
        }
    }
}
