//! Debounced watching against the real filesystem.

use crate::integration::test_utils::{drain_for, write_json, Fixture};
use fig::{ConfigFileManager, PersistenceOptions};
use serde_json::json;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(100);
const SETTLE: Duration = Duration::from_millis(800);

fn manager() -> ConfigFileManager {
    ConfigFileManager::new(PersistenceOptions {
        debounce: DEBOUNCE,
        ..PersistenceOptions::default()
    })
}

fn channel_callback() -> (impl Fn(&std::path::Path) + Send + Sync + 'static, mpsc::Receiver<PathBuf>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let callback = move |path: &std::path::Path| {
        let _ = tx.lock().unwrap().send(path.to_path_buf());
    };
    (callback, rx)
}

#[test]
fn test_burst_of_writes_fires_once() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({}));

    let manager = manager();
    let (callback, rx) = channel_callback();
    let _token = manager.start_watching(&path, callback).unwrap();

    for i in 0..5 {
        std::fs::write(&path, format!("{{\"n\": {}}}", i)).unwrap();
    }

    let fired = drain_for(&rx, SETTLE);
    assert_eq!(fired.len(), 1, "burst should collapse into one notification");
    assert_eq!(fired[0], path);
}

#[test]
fn test_atomic_replace_is_observed() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({"env": {"A": "1"}}));

    let watching = manager();
    let (callback, rx) = channel_callback();
    let _token = watching.start_watching(&path, callback).unwrap();

    // Another writer replacing the file by rename.
    let writer = ConfigFileManager::default();
    writer.write(&json!({"env": {"A": "2"}}), &path).unwrap();

    let fired = drain_for(&rx, SETTLE);
    assert!(!fired.is_empty(), "rename into place should notify");
}

#[test]
fn test_sibling_files_do_not_notify() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({}));

    let manager = manager();
    let (callback, rx) = channel_callback();
    let _token = manager.start_watching(&path, callback).unwrap();

    let sibling = path.with_file_name("other.json");
    std::fs::write(&sibling, "{}").unwrap();

    assert!(drain_for(&rx, SETTLE).is_empty());
}

#[test]
fn test_unsubscribe_keeps_other_subscriptions() {
    let fixture = Fixture::new();
    let path = fixture.paths.global_settings();
    write_json(&path, &json!({}));

    let manager = manager();
    let (first_cb, first_rx) = channel_callback();
    let (second_cb, second_rx) = channel_callback();
    let first = manager.start_watching(&path, first_cb).unwrap();
    let _second = manager.start_watching(&path, second_cb).unwrap();
    assert_eq!(manager.watcher().subscription_count(&path), 2);

    manager.stop_watching(&first);
    assert_eq!(manager.watcher().subscription_count(&path), 1);

    std::fs::write(&path, "{\"changed\": true}").unwrap();

    assert!(!drain_for(&second_rx, SETTLE).is_empty());
    assert!(first_rx.try_recv().is_err());
}

#[test]
fn test_watch_follows_directory_creation() {
    let fixture = Fixture::new();
    let path = fixture.paths.project_local_settings().unwrap();
    assert!(!path.parent().unwrap().exists());

    let manager = manager();
    let (callback, rx) = channel_callback();
    let _token = manager.start_watching(&path, callback).unwrap();
    assert!(!manager.watcher().is_armed(&path));

    // Another tool creates `.claude/` and the file; nobody calls rearm.
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{\"env\": {\"A\": \"1\"}}").unwrap();

    let fired = drain_for(&rx, SETTLE);
    assert!(!fired.is_empty(), "file created with its directory should notify");
    assert!(manager.watcher().is_armed(&path));

    // Later edits arrive through the armed directory watch.
    std::fs::write(&path, "{\"env\": {\"A\": \"2\"}}").unwrap();
    assert!(!drain_for(&rx, SETTLE).is_empty());
}
