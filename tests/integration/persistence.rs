//! File manager behaviour: lossless round trips, backups, symlinks, async entry points.

use crate::integration::test_utils::{read_json, write_json, Fixture};
use fig::error::FileError;
use fig::settings::ConfigDocument;
use fig::{ConfigFileManager, PersistenceOptions};
use serde_json::json;
use std::fs;

fn backups_in(dir: &std::path::Path, name: &str) -> Vec<String> {
    let prefix = format!("{}.backup.", name);
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(&prefix))
        .collect();
    names.sort();
    names
}

#[test]
fn test_unknown_keys_survive_read_write() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    let original = json!({
        "model": "opus",
        "permissions": {"allow": ["Read"], "defaultMode": "acceptEdits"},
        "hooks": {"Stop": [{"hooks": [{"type": "command", "command": "say done", "timeout": 5}]}]},
        "statusLine": {"type": "command", "command": "status.sh"},
        "attribution": {"commits": true, "footer": "x"}
    });
    write_json(&path, &original);

    let manager = ConfigFileManager::default();
    let document: ConfigDocument = manager.read(&path).unwrap().unwrap();
    manager.write(&document, &path).unwrap();

    assert_eq!(read_json(&path), original);
}

#[test]
fn test_overwrite_creates_exactly_one_backup() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({"env": {"A": "old"}}));

    let manager = ConfigFileManager::default();
    let new_doc: ConfigDocument = serde_json::from_value(json!({"env": {"A": "new"}})).unwrap();
    let outcome = manager.write(&new_doc, &path).unwrap();

    let dir = path.parent().unwrap();
    let backups = backups_in(dir, "settings.json");
    assert_eq!(backups.len(), 1);
    assert_eq!(outcome.backup.as_deref(), Some(dir.join(&backups[0]).as_path()));
    assert_eq!(read_json(&dir.join(&backups[0])), json!({"env": {"A": "old"}}));
    assert_eq!(manager.read::<ConfigDocument>(&path).unwrap(), Some(new_doc));
}

#[test]
fn test_written_keys_are_sorted() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    let manager = ConfigFileManager::default();
    manager
        .write(&json!({"zeta": 1, "alpha": {"b": 1, "a": 2}}), &path)
        .unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.find("\"alpha\"").unwrap() < text.find("\"zeta\"").unwrap());
    assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
}

#[test]
fn test_missing_and_invalid_files() {
    let fixture = Fixture::new();
    let manager = ConfigFileManager::default();
    let path = fixture.paths.project_shared_settings().unwrap();
    assert_eq!(manager.read::<ConfigDocument>(&path).unwrap(), None);

    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{ invalid json }").unwrap();
    assert!(matches!(
        manager.read::<ConfigDocument>(&path),
        Err(FileError::InvalidJson { line: Some(1), .. })
    ));
}

#[test]
fn test_backups_pruned_to_limit() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    let manager = ConfigFileManager::new(PersistenceOptions {
        max_backups: 3,
        ..PersistenceOptions::default()
    });
    for i in 0..8 {
        manager.write(&json!({"n": i}), &path).unwrap();
    }
    let backups = manager.backups(&path).unwrap();
    assert_eq!(backups.len(), 3);
    // Newest backup holds the content replaced by the last write.
    assert_eq!(read_json(backups.last().unwrap()), json!({"n": 6}));
}

#[cfg(unix)]
#[test]
fn test_write_through_symlink_updates_target() {
    let fixture = Fixture::new();
    let real = fixture.dir.path().join("dotfiles").join("settings.json");
    write_json(&real, &json!({"env": {"A": "1"}}));
    let link = fixture.paths.global_settings();
    fs::create_dir_all(link.parent().unwrap()).unwrap();
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let manager = ConfigFileManager::default();
    let outcome = manager.write(&json!({"env": {"A": "2"}}), &link).unwrap();

    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(outcome.written, real);
    assert_eq!(read_json(&real), json!({"env": {"A": "2"}}));
    assert_eq!(backups_in(real.parent().unwrap(), "settings.json").len(), 1);
}

#[cfg(unix)]
#[test]
fn test_circular_symlink_rejected() {
    let fixture = Fixture::new();
    let a = fixture.dir.path().join("a.json");
    let b = fixture.dir.path().join("b.json");
    std::os::unix::fs::symlink(&b, &a).unwrap();
    std::os::unix::fs::symlink(&a, &b).unwrap();

    let manager = ConfigFileManager::default();
    assert!(matches!(
        manager.read::<ConfigDocument>(&a),
        Err(FileError::CircularSymlink(_))
    ));
    assert!(matches!(
        manager.write(&json!({}), &a),
        Err(FileError::CircularSymlink(_))
    ));
}

#[cfg(unix)]
#[test]
fn test_file_mode_preserved() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({}));
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

    ConfigFileManager::default()
        .write(&json!({"env": {"TOKEN": "x"}}), &path)
        .unwrap();
    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[cfg(unix)]
#[test]
fn test_failed_backup_leaves_target_untouched() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    let dir = path.parent().unwrap().to_path_buf();
    fs::create_dir_all(&dir).unwrap();
    let original = b"{\n  \"model\": \"opus\",   \"env\": {\"A\": \"1\"}\n}\n";
    fs::write(&path, original).unwrap();

    // An unreadable target cannot be copied into a backup.
    fs::set_permissions(&path, fs::Permissions::from_mode(0o200)).unwrap();
    if fs::File::open(&path).is_ok() {
        // Privileged users read regardless of mode.
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let result = ConfigFileManager::default().write(&json!({"model": "haiku"}), &path);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    match result {
        Err(FileError::BackupFailed { path: failed, .. }) => {
            assert_eq!(failed.file_name(), path.file_name())
        }
        other => panic!("expected BackupFailed, got {:?}", other),
    }
    assert_eq!(fs::read(&path).unwrap(), original);
    assert!(backups_in(&dir, "settings.json").is_empty());
    let leftovers: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("settings.json")]);
}

#[tokio::test]
async fn test_async_read_write() {
    let fixture = Fixture::new();
    let path = fixture.paths.project_local_settings().unwrap();
    let manager = ConfigFileManager::default();

    let doc: ConfigDocument =
        serde_json::from_value(json!({"permissions": {"deny": ["Read(.env)"]}})).unwrap();
    let outcome = manager.write_async(doc.clone(), path.clone()).await.unwrap();
    assert!(outcome.backup.is_none());

    let back: Option<ConfigDocument> = manager.read_async(path).await.unwrap();
    assert_eq!(back, Some(doc));
}
