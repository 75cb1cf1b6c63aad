//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::command_name;
use crate::cli::parse::{
    Commands, EnvCommands, LocationArg, McpCommands, RuleCommands, ToolCommands,
};
use crate::cli::presentation::{
    format_copy_outcome, format_edit_result, format_merged, format_paths, format_projects,
    format_server_list, PathEntry,
};
use crate::config::{global_config_path, ConfigLoader, FigConfig};
use crate::editor::{EditTarget, SettingsEditor};
use crate::error::{FigError, McpCopyError};
use crate::layers;
use crate::mcp_copy::{self, McpLocation};
use crate::persistence::ConfigFileManager;
use crate::settings::{ConfigPaths, ConfigSource, PermissionKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runtime context for CLI execution: resolved paths, config, and the file manager.
pub struct RunContext {
    config: FigConfig,
    config_path: Option<PathBuf>,
    paths: ConfigPaths,
    manager: ConfigFileManager,
}

impl RunContext {
    /// Build from the project directory, an optional home override, and an optional
    /// config file. The home override wins over `home_dir` from config.
    pub fn new(
        project: PathBuf,
        home: Option<PathBuf>,
        config_path: Option<PathBuf>,
    ) -> Result<Self, FigError> {
        let mut config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        if home.is_some() {
            config.home_dir = home;
        }
        config.validate()?;

        let project = absolute(&project);
        let paths = config.paths(Some(&project))?;
        let manager = ConfigFileManager::new(config.persistence_options());
        debug!(
            home = %paths.home().display(),
            project = %project.display(),
            "Run context ready"
        );

        Ok(Self {
            config,
            config_path,
            paths,
            manager,
        })
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, FigError> {
        let started = Instant::now();
        let name = command_name(command);
        let result = self.execute_inner(command);
        info!(
            command = %name,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, FigError> {
        match command {
            Commands::Paths { format } => self.handle_paths(format),
            Commands::Show { format } => {
                let merged = layers::load_merged(&self.manager, &self.paths)?;
                format_merged(&merged, format)
            }
            Commands::Rule { command } => self.handle_rule_command(command),
            Commands::Env { command } => self.handle_env_command(command),
            Commands::Tool { command } => self.handle_tool_command(command),
            Commands::Mcp { command } => self.handle_mcp_command(command),
            Commands::Watch {
                source,
                debounce_ms,
                limit,
            } => self.handle_watch(*source, *debounce_ms, *limit),
        }
    }

    fn handle_paths(&self, format: &str) -> Result<String, FigError> {
        let mut entries: Vec<PathEntry> = ConfigSource::ALL
            .into_iter()
            .filter_map(|source| {
                source.path(&self.paths).map(|path| PathEntry {
                    kind: source.label().to_string(),
                    exists: path.is_file(),
                    path,
                })
            })
            .collect();

        let mut extra = vec![("registry", self.paths.global_registry())];
        if let Some(mcp) = self.paths.project_mcp() {
            extra.push(("project-mcp", mcp));
        }
        if let Some(config) = self.config_path.clone().or_else(global_config_path) {
            extra.push(("fig-config", config));
        }
        entries.extend(extra.into_iter().map(|(kind, path)| PathEntry {
            kind: kind.to_string(),
            exists: path.is_file(),
            path,
        }));

        format_paths(&entries, format)
    }

    fn target(&self, source: ConfigSource) -> Result<EditTarget, FigError> {
        EditTarget::for_source(source, &self.paths)
            .ok_or_else(|| McpCopyError::NoProject.into())
    }

    /// Load `source`, apply `edit`, and save if anything changed.
    fn edit_and_save<F>(&self, source: ConfigSource, action: &str, edit: F) -> Result<String, FigError>
    where
        F: FnOnce(&SettingsEditor) -> Result<(), FigError>,
    {
        let target = self.target(source)?;
        let editor = SettingsEditor::load(target.clone(), Arc::new(self.manager.clone()))?;
        edit(&editor)?;

        if !editor.is_dirty() {
            return Ok(format_edit_result(action, &target, None));
        }
        let outcome = editor.save()?;
        editor.close();
        Ok(format_edit_result(action, &target, Some(&outcome)))
    }

    fn handle_rule_command(&self, command: &RuleCommands) -> Result<String, FigError> {
        let kind_of = |deny: bool| {
            if deny {
                PermissionKind::Deny
            } else {
                PermissionKind::Allow
            }
        };
        match command {
            RuleCommands::Add { rule, deny, source } => {
                let kind = kind_of(*deny);
                self.edit_and_save(
                    *source,
                    &format!("Added {} rule '{}'", kind, rule.trim()),
                    |editor| editor.add_rule(kind, rule),
                )
            }
            RuleCommands::Remove { rule, deny, source } => {
                let kind = kind_of(*deny);
                self.edit_and_save(
                    *source,
                    &format!("Removed {} rule '{}'", kind, rule.trim()),
                    |editor| editor.remove_rule(kind, rule),
                )
            }
        }
    }

    fn handle_env_command(&self, command: &EnvCommands) -> Result<String, FigError> {
        match command {
            EnvCommands::Set { key, value, source } => self.edit_and_save(
                *source,
                &format!("Set {}", key.trim()),
                |editor| editor.update_env_var(key, value),
            ),
            EnvCommands::Unset { key, source } => self.edit_and_save(
                *source,
                &format!("Unset {}", key.trim()),
                |editor| editor.remove_env_var(key),
            ),
        }
    }

    fn handle_tool_command(&self, command: &ToolCommands) -> Result<String, FigError> {
        match command {
            ToolCommands::Add { name, source } => self.edit_and_save(
                *source,
                &format!("Disallowed tool '{}'", name.trim()),
                |editor| editor.add_disallowed_tool(name),
            ),
            ToolCommands::Remove { name, source } => self.edit_and_save(
                *source,
                &format!("Allowed tool '{}' again", name.trim()),
                |editor| editor.remove_disallowed_tool(name),
            ),
        }
    }

    fn location(&self, arg: LocationArg) -> Result<McpLocation, FigError> {
        match arg {
            LocationArg::Global => Ok(McpLocation::Global),
            LocationArg::Project => Ok(McpLocation::project_of(&self.paths)?),
        }
    }

    fn handle_mcp_command(&self, command: &McpCommands) -> Result<String, FigError> {
        match command {
            McpCommands::Copy {
                name,
                from,
                to,
                on_conflict,
            } => {
                let outcome = mcp_copy::copy_mcp_server(
                    &self.manager,
                    &self.paths,
                    name,
                    &self.location(*from)?,
                    &self.location(*to)?,
                    *on_conflict,
                )?;
                Ok(format_copy_outcome(&outcome))
            }
            McpCommands::List { location, format } => {
                let servers =
                    mcp_copy::list_servers(&self.manager, &self.paths, &self.location(*location)?)?;
                format_server_list(&servers, format)
            }
            McpCommands::Projects => {
                let projects = mcp_copy::registered_projects(&self.manager, &self.paths)?;
                Ok(format_projects(&projects))
            }
        }
    }

    /// Block printing one line per debounced change until Ctrl-C or `limit` is reached.
    fn handle_watch(
        &self,
        source: Option<ConfigSource>,
        debounce_ms: Option<u64>,
        limit: Option<usize>,
    ) -> Result<String, FigError> {
        let mut options = self.config.persistence_options();
        if let Some(ms) = debounce_ms.filter(|ms| *ms > 0) {
            options.debounce = Duration::from_millis(ms);
        }
        let manager = ConfigFileManager::new(options);

        let sources: Vec<ConfigSource> = match source {
            Some(source) => vec![source],
            None => ConfigSource::ALL.to_vec(),
        };

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut tokens = Vec::new();
        for source in sources {
            let Some(path) = source.path(&self.paths) else {
                continue;
            };
            let tx = tx.clone();
            let token = manager.start_watching(&path, move |changed: &Path| {
                let _ = tx.send((source, changed.to_path_buf()));
            })?;
            println!("Watching {} ({})", source, path.display());
            tokens.push(token);
        }
        drop(tx);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FigError::Configuration(crate::error::ConfigurationError::Other(
                format!("failed to start runtime: {}", e),
            )))?;

        let seen = runtime.block_on(async {
            let mut seen = 0usize;
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some((source, path)) = event else { break };
                        seen += 1;
                        println!("{}", describe_change(&manager, source, &path));
                        if limit.map(|limit| seen >= limit).unwrap_or(false) {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            seen
        });

        for token in &tokens {
            manager.stop_watching(token);
        }
        Ok(format!("Stopped watching after {} change(s)", seen))
    }
}

fn describe_change(manager: &ConfigFileManager, source: ConfigSource, path: &Path) -> String {
    let stamp = chrono::Utc::now().format("%H:%M:%S");
    match manager.read::<crate::settings::ConfigDocument>(path) {
        Ok(Some(_)) => format!("[{}] {} changed: {}", stamp, source, path.display()),
        Ok(None) => format!("[{}] {} removed: {}", stamp, source, path.display()),
        Err(e) => format!("[{}] {} changed but cannot be read: {}", stamp, source, e),
    }
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
