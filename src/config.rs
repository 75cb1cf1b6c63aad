//! Configuration System
//!
//! Fig's own settings, separate from the documents it edits. Layered with the
//! `config` crate: built-in defaults, then the global config file, then `FIG__`
//! environment variables.

use crate::error::ConfigurationError;
use crate::logging::LoggingConfig;
use crate::persistence::{PersistenceOptions, DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_BACKUPS};
use crate::settings::ConfigPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FigConfig {
    /// Directory standing in for `~` when locating settings files
    #[serde(default)]
    pub home_dir: Option<PathBuf>,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period before a change notification fires
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Backups kept per file; 0 keeps all
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

fn default_max_backups() -> usize {
    DEFAULT_MAX_BACKUPS
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_backups: default_max_backups(),
        }
    }
}

impl FigConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.watch.debounce_ms == 0 {
            return Err(ConfigurationError::InvalidConfiguration(
                "watch.debounce_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(home) = &self.home_dir {
            if home.as_os_str().is_empty() {
                return Err(ConfigurationError::InvalidConfiguration(
                    "home_dir cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn persistence_options(&self) -> PersistenceOptions {
        PersistenceOptions {
            max_backups: self.backup.max_backups,
            debounce: Duration::from_millis(self.watch.debounce_ms),
        }
    }

    /// Home directory: the configured override, else the user's home.
    pub fn resolve_home(&self) -> Result<PathBuf, ConfigurationError> {
        if let Some(home) = &self.home_dir {
            return Ok(home.clone());
        }
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigurationError::MissingRequiredKey(
                    "home_dir (no home directory could be determined)".to_string(),
                )
            })
    }

    /// Settings file locations for `project`.
    pub fn paths(&self, project: Option<&Path>) -> Result<ConfigPaths, ConfigurationError> {
        Ok(ConfigPaths::new(
            self.resolve_home()?,
            project.map(Path::to_path_buf),
        ))
    }
}

/// Loads [`FigConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global config file, then `FIG__` environment variables.
    pub fn load() -> Result<FigConfig, ConfigurationError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Defaults, then `path` (which must exist), then `FIG__` environment variables.
    pub fn load_from_file(path: &Path) -> Result<FigConfig, ConfigurationError> {
        if !path.is_file() {
            return Err(ConfigurationError::InvalidConfiguration(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_file(builder, path, true);
        let builder = sources::environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Built-in defaults only.
    pub fn default() -> FigConfig {
        FigConfig::default()
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<FigConfig, ConfigurationError> {
        let config: FigConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
