//! Settings sources and the file layout they map to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Origin of a settings document, ordered by precedence (lowest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigSource {
    /// `~/.claude/settings.json`
    Global,
    /// `<project>/.claude/settings.json`
    ProjectShared,
    /// `<project>/.claude/settings.local.json`
    ProjectLocal,
}

impl ConfigSource {
    /// All sources in ascending precedence order.
    pub const ALL: [ConfigSource; 3] = [
        ConfigSource::Global,
        ConfigSource::ProjectShared,
        ConfigSource::ProjectLocal,
    ];

    pub fn precedence(self) -> u8 {
        match self {
            ConfigSource::Global => 0,
            ConfigSource::ProjectShared => 1,
            ConfigSource::ProjectLocal => 2,
        }
    }

    /// Human-readable label used by the CLI and log output.
    pub fn label(self) -> &'static str {
        match self {
            ConfigSource::Global => "global",
            ConfigSource::ProjectShared => "project-shared",
            ConfigSource::ProjectLocal => "project-local",
        }
    }

    /// Whether the file is intended to live in version control.
    pub fn is_version_controlled(self) -> bool {
        matches!(self, ConfigSource::ProjectShared)
    }

    /// Resolve the file path for this source, if the layout allows it.
    ///
    /// Project sources resolve to `None` when no project directory is set.
    pub fn path(self, paths: &ConfigPaths) -> Option<PathBuf> {
        match self {
            ConfigSource::Global => Some(paths.global_settings()),
            ConfigSource::ProjectShared => paths.project_shared_settings(),
            ConfigSource::ProjectLocal => paths.project_local_settings(),
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ConfigSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" | "user" => Ok(ConfigSource::Global),
            "shared" | "project" | "project-shared" => Ok(ConfigSource::ProjectShared),
            "local" | "project-local" => Ok(ConfigSource::ProjectLocal),
            other => Err(format!(
                "unknown source '{}' (expected global, shared, or local)",
                other
            )),
        }
    }
}

/// File layout rooted at a home directory and an optional project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    home: PathBuf,
    project: Option<PathBuf>,
}

impl ConfigPaths {
    pub fn new(home: impl Into<PathBuf>, project: Option<PathBuf>) -> Self {
        Self {
            home: home.into(),
            project,
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn project(&self) -> Option<&Path> {
        self.project.as_deref()
    }

    pub fn with_project(mut self, project: impl Into<PathBuf>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// `~/.claude.json`: project registry and global MCP servers
    pub fn global_registry(&self) -> PathBuf {
        self.home.join(".claude.json")
    }

    pub fn global_settings(&self) -> PathBuf {
        self.home.join(".claude").join("settings.json")
    }

    pub fn project_shared_settings(&self) -> Option<PathBuf> {
        self.project
            .as_ref()
            .map(|p| p.join(".claude").join("settings.json"))
    }

    pub fn project_local_settings(&self) -> Option<PathBuf> {
        self.project
            .as_ref()
            .map(|p| p.join(".claude").join("settings.local.json"))
    }

    /// `<project>/.mcp.json`
    pub fn project_mcp(&self) -> Option<PathBuf> {
        self.project.as_ref().map(|p| p.join(".mcp.json"))
    }
}
