//! Merge rules: defaults first, later sources override.

use crate::persistence::{DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_BACKUPS};
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("watch.debounce_ms", DEFAULT_DEBOUNCE_MS)?
        .set_default("backup.max_backups", DEFAULT_MAX_BACKUPS as u64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
