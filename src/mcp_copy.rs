//! Copy MCP server definitions between the global registry and project files.

use crate::error::{FigError, McpCopyError};
use crate::persistence::ConfigFileManager;
use crate::settings::{ConfigPaths, GlobalRegistry, McpConfig, McpServer, McpServerMap};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// A file that holds an `mcpServers` map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpLocation {
    /// `~/.claude.json`
    Global,
    /// `<project>/.mcp.json`
    Project(PathBuf),
}

impl McpLocation {
    /// Project location for the project in `paths`.
    pub fn project_of(paths: &ConfigPaths) -> Result<Self, McpCopyError> {
        paths
            .project()
            .map(|p| McpLocation::Project(p.to_path_buf()))
            .ok_or(McpCopyError::NoProject)
    }

    pub fn file_path(&self, paths: &ConfigPaths) -> PathBuf {
        match self {
            McpLocation::Global => paths.global_registry(),
            McpLocation::Project(dir) => dir.join(".mcp.json"),
        }
    }
}

impl fmt::Display for McpLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpLocation::Global => write!(f, "global"),
            McpLocation::Project(dir) => write!(f, "project {}", dir.display()),
        }
    }
}

/// What to do when the destination already has a server with the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyConflictPolicy {
    #[default]
    Skip,
    Overwrite,
    Rename,
}

impl FromStr for CopyConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(CopyConflictPolicy::Skip),
            "overwrite" => Ok(CopyConflictPolicy::Overwrite),
            "rename" => Ok(CopyConflictPolicy::Rename),
            other => Err(format!(
                "unknown conflict policy '{}' (expected skip, overwrite or rename)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { name: String, destination: PathBuf },
    Overwritten { name: String, destination: PathBuf },
    /// Stored under `name` because the original name was taken
    Renamed { name: String, destination: PathBuf },
    Skipped { name: String },
}

impl CopyOutcome {
    /// Name the server ended up under at the destination, if it was written.
    pub fn stored_name(&self) -> Option<&str> {
        match self {
            CopyOutcome::Copied { name, .. }
            | CopyOutcome::Overwritten { name, .. }
            | CopyOutcome::Renamed { name, .. } => Some(name),
            CopyOutcome::Skipped { .. } => None,
        }
    }
}

enum McpFile {
    Registry(GlobalRegistry),
    Project(McpConfig),
}

impl McpFile {
    fn load(manager: &ConfigFileManager, location: &McpLocation, path: &Path) -> Result<Self, FigError> {
        Ok(match location {
            McpLocation::Global => McpFile::Registry(manager.read(path)?.unwrap_or_default()),
            McpLocation::Project(_) => McpFile::Project(manager.read(path)?.unwrap_or_default()),
        })
    }

    fn map(&self) -> &dyn McpServerMap {
        match self {
            McpFile::Registry(registry) => registry,
            McpFile::Project(config) => config,
        }
    }

    fn map_mut(&mut self) -> &mut dyn McpServerMap {
        match self {
            McpFile::Registry(registry) => registry,
            McpFile::Project(config) => config,
        }
    }

    fn save(&self, manager: &ConfigFileManager, path: &Path) -> Result<(), FigError> {
        match self {
            McpFile::Registry(registry) => manager.write(registry, path)?,
            McpFile::Project(config) => manager.write(config, path)?,
        };
        Ok(())
    }
}

/// First free `<name>-copy`, `<name>-copy-2`, ... in `map`.
fn free_copy_name(map: &dyn McpServerMap, name: &str) -> String {
    let first = format!("{}-copy", name);
    if !map.contains_server(&first) {
        return first;
    }
    (2..)
        .map(|n| format!("{}-copy-{}", name, n))
        .find(|candidate| !map.contains_server(candidate))
        .unwrap_or(first)
}

/// Copy server `name` from one location to another.
///
/// With [`CopyConflictPolicy::Skip`] and a name clash the destination file is not
/// touched at all.
pub fn copy_mcp_server(
    manager: &ConfigFileManager,
    paths: &ConfigPaths,
    name: &str,
    from: &McpLocation,
    to: &McpLocation,
    policy: CopyConflictPolicy,
) -> Result<CopyOutcome, FigError> {
    if from == to {
        return Err(McpCopyError::SameLocation.into());
    }

    let source_path = from.file_path(paths);
    let server: McpServer = McpFile::load(manager, from, &source_path)?
        .map()
        .server(name)
        .cloned()
        .ok_or_else(|| McpCopyError::ServerNotFound(name.to_string()))?;

    let destination = to.file_path(paths);
    let mut target = McpFile::load(manager, to, &destination)?;

    let exists = target.map().contains_server(name);
    let (stored_as, outcome) = match (exists, policy) {
        (false, _) => (
            name.to_string(),
            CopyOutcome::Copied {
                name: name.to_string(),
                destination: destination.clone(),
            },
        ),
        (true, CopyConflictPolicy::Skip) => {
            info!(server = name, destination = %destination.display(), "Server exists; skipped");
            return Ok(CopyOutcome::Skipped {
                name: name.to_string(),
            });
        }
        (true, CopyConflictPolicy::Overwrite) => (
            name.to_string(),
            CopyOutcome::Overwritten {
                name: name.to_string(),
                destination: destination.clone(),
            },
        ),
        (true, CopyConflictPolicy::Rename) => {
            let renamed = free_copy_name(target.map(), name);
            (
                renamed.clone(),
                CopyOutcome::Renamed {
                    name: renamed,
                    destination: destination.clone(),
                },
            )
        }
    };

    target.map_mut().servers_mut().insert(stored_as.clone(), server);
    target.save(manager, &destination)?;
    info!(
        server = name,
        stored_as = %stored_as,
        from = %from,
        to = %to,
        "Copied MCP server"
    );
    Ok(outcome)
}

/// Servers defined at `location`, by name.
pub fn list_servers(
    manager: &ConfigFileManager,
    paths: &ConfigPaths,
    location: &McpLocation,
) -> Result<BTreeMap<String, McpServer>, FigError> {
    let path = location.file_path(paths);
    Ok(McpFile::load(manager, location, &path)?
        .map()
        .servers()
        .cloned()
        .unwrap_or_default())
}

/// Project paths recorded in `~/.claude.json`.
pub fn registered_projects(
    manager: &ConfigFileManager,
    paths: &ConfigPaths,
) -> Result<Vec<String>, FigError> {
    let registry: Option<GlobalRegistry> = manager.read(&paths.global_registry())?;
    Ok(registry.map(|r| r.registered_projects()).unwrap_or_default())
}
