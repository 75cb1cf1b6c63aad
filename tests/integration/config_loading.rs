//! Loading Fig's own configuration from the global file and environment.

use crate::integration::test_utils::with_isolated_env;
use fig::config::{global_config_path, ConfigLoader};
use std::path::PathBuf;
use tempfile::TempDir;

fn write_global_config(test_dir: &TempDir, contents: &str) -> PathBuf {
    let path = test_dir.path().join("xdg-config").join("fig").join("config.toml");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_defaults_without_config_file() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config, ConfigLoader::default());

        let home = config.resolve_home().unwrap();
        assert_eq!(home, test_dir.path().join("home"));
    });
}

#[test]
fn test_global_config_file_is_used() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let written = write_global_config(
            &test_dir,
            "[watch]\ndebounce_ms = 120\n\n[backup]\nmax_backups = 2\n",
        );
        assert_eq!(global_config_path(), Some(written));

        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.watch.debounce_ms, 120);
        assert_eq!(config.backup.max_backups, 2);
        assert_eq!(config.persistence_options().max_backups, 2);
    });
}

#[test]
fn test_environment_overrides_file() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        write_global_config(&test_dir, "[watch]\ndebounce_ms = 120\n");
        std::env::set_var("FIG__WATCH__DEBOUNCE_MS", "75");

        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.watch.debounce_ms, 75);
    });
}

#[test]
fn test_invalid_values_are_rejected() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        write_global_config(&test_dir, "[watch]\ndebounce_ms = 0\n");
        assert!(ConfigLoader::load().is_err());
    });
}

#[test]
fn test_load_from_explicit_file() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let custom = test_dir.path().join("custom.toml");
        let home = test_dir.path().join("elsewhere");
        std::fs::write(
            &custom,
            format!("home_dir = {:?}\n\n[logging]\nlevel = \"debug\"\n", home.display().to_string()),
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&custom).unwrap();
        assert_eq!(config.home_dir.as_deref(), Some(home.as_path()));
        assert_eq!(config.logging.level, "debug");

        let paths = config.paths(Some(test_dir.path())).unwrap();
        assert_eq!(paths.global_settings(), home.join(".claude").join("settings.json"));

        assert!(ConfigLoader::load_from_file(&test_dir.path().join("missing.toml")).is_err());
    });
}
