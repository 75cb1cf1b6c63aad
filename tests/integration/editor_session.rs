//! Edit sessions backed by the real file manager and watcher.

use crate::integration::test_utils::{read_json, wait_until, write_json, Fixture};
use fig::error::SessionError;
use fig::settings::PermissionKind;
use fig::{
    ConfigFileManager, ConfigSource, EditTarget, FigError, PersistenceOptions, Resolution,
    SessionState, SettingsEditor, SettingsStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(3);

fn store() -> Arc<dyn SettingsStore> {
    Arc::new(ConfigFileManager::new(PersistenceOptions {
        debounce: Duration::from_millis(50),
        ..PersistenceOptions::default()
    }))
}

fn open(fixture: &Fixture, source: ConfigSource) -> SettingsEditor {
    let target = EditTarget::for_source(source, &fixture.paths).unwrap();
    SettingsEditor::load(target, store()).unwrap()
}

#[test]
fn test_edit_and_save_preserves_unknown_keys() {
    let fixture = Fixture::new();
    let path = fixture.paths.project_shared_settings().unwrap();
    write_json(
        &path,
        &json!({"model": "sonnet", "permissions": {"allow": ["Read"], "ask": ["Bash"]}}),
    );

    let editor = open(&fixture, ConfigSource::ProjectShared);
    editor.add_rule(PermissionKind::Allow, "Bash(npm test)").unwrap();
    editor.update_env_var("CI", "1").unwrap();
    assert_eq!(editor.state(), SessionState::Dirty);

    let outcome = editor.save().unwrap();
    assert!(outcome.backup.is_some());
    assert_eq!(editor.state(), SessionState::Clean);
    assert_eq!(
        read_json(&path),
        json!({
            "env": {"CI": "1"},
            "model": "sonnet",
            "permissions": {"allow": ["Read", "Bash(npm test)"], "ask": ["Bash"]}
        })
    );
}

#[test]
fn test_external_change_reloads_clean_session() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({"env": {"A": "1"}}));

    let editor = open(&fixture, ConfigSource::Global);
    write_json(&path, &json!({"env": {"A": "2"}}));

    assert!(wait_until(SETTLE, || {
        editor.document().env_var("A") == Some("2")
    }));
    assert_eq!(editor.state(), SessionState::Clean);
}

#[test]
fn test_external_change_while_dirty_is_a_conflict() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({"env": {"A": "1"}}));

    let editor = open(&fixture, ConfigSource::Global);
    editor.update_env_var("B", "local").unwrap();
    write_json(&path, &json!({"env": {"A": "external"}}));

    assert!(wait_until(SETTLE, || matches!(
        editor.state(),
        SessionState::ExternalChangeDetected { .. }
    )));
    assert!(matches!(
        editor.save(),
        Err(FigError::Session(SessionError::ConflictPending(_)))
    ));
    // Local edits are still there.
    assert_eq!(editor.document().env_var("B"), Some("local"));

    editor.resolve_conflict(Resolution::KeepLocal).unwrap();
    assert_eq!(editor.state(), SessionState::Dirty);
    editor.save().unwrap();
    assert_eq!(read_json(&path), json!({"env": {"A": "1", "B": "local"}}));
}

#[test]
fn test_use_external_discards_edits() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({"permissions": {"deny": ["Read(.env)"]}}));

    let editor = open(&fixture, ConfigSource::Global);
    editor.add_disallowed_tool("WebFetch").unwrap();
    write_json(&path, &json!({"permissions": {"deny": ["Read(secrets/**)"]}}));

    assert!(wait_until(SETTLE, || editor.state() != SessionState::Dirty));
    editor.resolve_conflict(Resolution::UseExternal).unwrap();
    assert_eq!(editor.state(), SessionState::Clean);
    assert!(editor.document().disallowed_tools().is_empty());
    assert_eq!(
        editor.document().deny_rules(),
        ["Read(secrets/**)".to_string()]
    );
}

#[test]
fn test_own_save_is_not_reported_as_external() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({}));

    let editor = open(&fixture, ConfigSource::Global);
    let mut events = editor.subscribe();
    editor.add_rule(PermissionKind::Deny, "Read(.env)").unwrap();
    editor.save().unwrap();

    // Leave time for the watcher to see our own write.
    std::thread::sleep(Duration::from_millis(500));
    assert_eq!(editor.state(), SessionState::Clean);

    let mut saw_conflict = false;
    let mut saw_reload = false;
    while let Ok(event) = events.try_recv() {
        match event {
            fig::EditorEvent::ExternalChangeDetected { .. } => saw_conflict = true,
            fig::EditorEvent::Reloaded { .. } => saw_reload = true,
            _ => {}
        }
    }
    assert!(!saw_conflict);
    assert!(!saw_reload);
}

#[test]
fn test_first_save_creates_directory_and_arms_watch() {
    let fixture = Fixture::new();
    let path = fixture.paths.project_local_settings().unwrap();
    assert!(!path.exists());

    let editor = open(&fixture, ConfigSource::ProjectLocal);
    assert_eq!(editor.state(), SessionState::Clean);
    editor.update_env_var("DEBUG", "1").unwrap();
    let outcome = editor.save().unwrap();
    assert!(outcome.backup.is_none());
    assert_eq!(read_json(&path), json!({"env": {"DEBUG": "1"}}));

    // Now the directory exists, outside changes reach the session.
    write_json(&path, &json!({"env": {"DEBUG": "0"}}));
    assert!(wait_until(SETTLE, || {
        editor.document().env_var("DEBUG") == Some("0")
    }));
}

#[test]
fn test_undo_back_to_baseline_is_clean() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({"env": {"A": "1"}}));

    let editor = open(&fixture, ConfigSource::Global);
    editor.update_env_var("A", "2").unwrap();
    editor.remove_env_var("A").unwrap();
    assert!(editor.is_dirty());

    editor.undo().unwrap();
    editor.undo().unwrap();
    assert!(!editor.is_dirty());
    assert_eq!(editor.state(), SessionState::Clean);
    assert!(matches!(
        editor.save(),
        Err(FigError::Session(SessionError::NotDirty))
    ));
}

#[test]
fn test_file_created_with_directory_conflicts_with_edits() {
    let fixture = Fixture::new();
    let path = fixture.paths.project_local_settings().unwrap();
    assert!(!path.parent().unwrap().exists());

    let editor = open(&fixture, ConfigSource::ProjectLocal);
    editor.add_rule(PermissionKind::Allow, "Read").unwrap();

    write_json(&path, &json!({"permissions": {"allow": ["Bash(ls)"]}}));

    assert!(wait_until(SETTLE, || matches!(
        editor.state(),
        SessionState::ExternalChangeDetected { .. }
    )));
    assert!(matches!(
        editor.save(),
        Err(FigError::Session(SessionError::ConflictPending(_)))
    ));
    assert_eq!(read_json(&path), json!({"permissions": {"allow": ["Bash(ls)"]}}));
}

#[test]
fn test_file_created_with_directory_reloads_clean_session() {
    let fixture = Fixture::new();
    let path = fixture.paths.project_local_settings().unwrap();

    let editor = open(&fixture, ConfigSource::ProjectLocal);
    write_json(&path, &json!({"env": {"FROM_CLI": "1"}}));

    assert!(wait_until(SETTLE, || {
        editor.document().env_var("FROM_CLI") == Some("1")
    }));
    assert_eq!(editor.state(), SessionState::Clean);
}
