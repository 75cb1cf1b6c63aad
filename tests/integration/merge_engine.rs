//! Merge behaviour over documents read from disk.

use crate::integration::test_utils::{write_json, Fixture};
use fig::layers::{load_layers, load_merged};
use fig::merge::{merge, merge_layers};
use fig::settings::{ConfigDocument, ConfigSource, PermissionKind};
use fig::ConfigFileManager;
use serde_json::json;

fn doc(value: serde_json::Value) -> ConfigDocument {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_env_override_keeps_lower_keys() {
    let fixture = Fixture::new();
    write_json(
        &fixture.paths.global_settings(),
        &json!({"env": {"DEBUG": "false", "LOG_LEVEL": "info"}}),
    );
    write_json(
        &fixture.paths.project_local_settings().unwrap(),
        &json!({"env": {"DEBUG": "true"}}),
    );

    let merged = load_merged(&ConfigFileManager::default(), &fixture.paths).unwrap();
    assert_eq!(merged.env.len(), 2);
    assert_eq!(merged.env["DEBUG"].value, "true");
    assert_eq!(merged.env["DEBUG"].source, ConfigSource::ProjectLocal);
    assert_eq!(merged.env["LOG_LEVEL"].value, "info");
    assert_eq!(merged.env["LOG_LEVEL"].source, ConfigSource::Global);
}

#[test]
fn test_union_attributes_to_lowest_source() {
    let global = doc(json!({
        "permissions": {"allow": ["Read", "Edit"], "deny": ["Bash(rm:*)"]},
        "disallowedTools": ["WebFetch"]
    }));
    let shared = doc(json!({
        "permissions": {"allow": ["Edit", "Bash(ls)"]},
        "disallowedTools": ["WebFetch", "WebSearch"]
    }));
    let local = doc(json!({"permissions": {"allow": ["Read"], "deny": ["Bash(rm:*)"]}}));

    let merged = merge(Some(&global), Some(&shared), Some(&local));
    let allow: Vec<(&str, ConfigSource)> = merged
        .permissions
        .allow
        .iter()
        .map(|v| (v.value.as_str(), v.source))
        .collect();
    assert_eq!(
        allow,
        vec![
            ("Read", ConfigSource::Global),
            ("Edit", ConfigSource::Global),
            ("Bash(ls)", ConfigSource::ProjectShared),
        ]
    );
    assert_eq!(merged.permissions.deny.len(), 1);
    assert_eq!(merged.permissions.deny[0].source, ConfigSource::Global);
    assert_eq!(merged.disallowed_tools.len(), 2);
    assert_eq!(merged.disallowed_tools[1].source, ConfigSource::ProjectShared);
    assert_eq!(
        merged.rules_from(PermissionKind::Allow, ConfigSource::ProjectShared),
        vec!["Bash(ls)"]
    );
}

#[test]
fn test_hooks_concatenate_in_precedence_order() {
    let group = |command: &str| {
        json!({"matcher": "Bash", "hooks": [{"type": "command", "command": command}]})
    };
    let global = doc(json!({"hooks": {"PreToolUse": [group("audit")]}}));
    let local = doc(json!({"hooks": {"PreToolUse": [group("audit")], "Stop": [group("bell")]}}));

    let merged = merge(Some(&global), None, Some(&local));
    let pre = &merged.hooks["PreToolUse"];
    assert_eq!(pre.len(), 2, "identical groups are not deduplicated");
    assert_eq!(pre[0].source, ConfigSource::Global);
    assert_eq!(pre[1].source, ConfigSource::ProjectLocal);
    assert_eq!(merged.hooks["Stop"].len(), 1);
}

#[test]
fn test_attribution_falls_through_whole_object() {
    let global = doc(json!({"attribution": {"commits": true}}));
    let shared = doc(json!({"permissions": {"allow": ["Read"]}}));

    let merged = merge(Some(&global), Some(&shared), None);
    let attribution = merged.attribution.unwrap();
    assert_eq!(attribution.source, ConfigSource::Global);
    assert_eq!(attribution.value.commits, Some(true));
    assert_eq!(attribution.value.pull_requests, None);

    let local = doc(json!({"attribution": {"pullRequests": false}}));
    let merged = merge(Some(&global), Some(&shared), Some(&local));
    let attribution = merged.attribution.unwrap();
    assert_eq!(attribution.source, ConfigSource::ProjectLocal);
    assert_eq!(attribution.value.commits, None, "objects are not merged field by field");
}

#[test]
fn test_merge_layers_ignores_caller_order() {
    let global = doc(json!({"env": {"A": "g"}, "permissions": {"allow": ["X"]}}));
    let local = doc(json!({"env": {"A": "l"}, "permissions": {"allow": ["X"]}}));

    let forward = merge_layers(&[
        (ConfigSource::Global, &global),
        (ConfigSource::ProjectLocal, &local),
    ]);
    let backward = merge_layers(&[
        (ConfigSource::ProjectLocal, &local),
        (ConfigSource::Global, &global),
    ]);
    assert_eq!(forward, backward);
    assert_eq!(forward.env_value("A"), Some("l"));
    assert_eq!(forward.permissions.allow[0].source, ConfigSource::Global);
}

#[test]
fn test_absent_project_layers() {
    let fixture = Fixture::new();
    let home_only = fig::ConfigPaths::new(fixture.paths.home(), None);
    write_json(
        &home_only.global_settings(),
        &json!({"permissions": {"deny": ["Bash(curl:*)"]}}),
    );

    let manager = ConfigFileManager::default();
    let layers = load_layers(&manager, &home_only).unwrap();
    assert_eq!(layers.len(), 1);
    let merged = load_merged(&manager, &home_only).unwrap();
    assert_eq!(merged.sources().into_iter().collect::<Vec<_>>(), vec![ConfigSource::Global]);
    assert!(merge(None, None, None).is_empty());
}
