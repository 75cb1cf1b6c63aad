//! Global config file source: $XDG_CONFIG_HOME/fig/config.toml or ~/.config/fig/config.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config")))?;
    Some(base.join("fig").join("config.toml"))
}

/// Add the global config file to the builder if it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match global_config_path() {
        Some(path) if path.exists() => {
            let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
            Ok(add_file(builder, &canonical, false))
        }
        Some(path) => {
            debug!(config_path = %path.display(), "No global config file; using defaults");
            Ok(builder)
        }
        None => Ok(builder),
    }
}

/// Add one TOML file source.
pub fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path).format(config::FileFormat::Toml).required(required))
}
