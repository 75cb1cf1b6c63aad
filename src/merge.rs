//! Merge Engine
//!
//! Combines the settings documents of every present source into one effective
//! configuration. Each merged value carries the source it came from. The merge is a
//! pure function of its inputs: no I/O, no failure mode, absent documents are empty.
//!
//! Field policies:
//! - `permissions.allow`, `permissions.deny`, `disallowedTools`: union in ascending
//!   precedence, first occurrence kept.
//! - `env`: per key, highest precedence wins.
//! - `hooks`: per event, groups concatenated in ascending precedence.
//! - `attribution`: whole object from the highest source that has one.

use crate::settings::{Attribution, ConfigDocument, ConfigSource, HookGroup, PermissionKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A value tagged with the source that contributed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergedValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> MergedValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedPermissions {
    pub allow: Vec<MergedValue<String>>,
    pub deny: Vec<MergedValue<String>>,
}

impl MergedPermissions {
    pub fn rules(&self, kind: PermissionKind) -> &[MergedValue<String>] {
        match kind {
            PermissionKind::Allow => &self.allow,
            PermissionKind::Deny => &self.deny,
        }
    }
}

/// Effective configuration with per-value provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedConfig {
    pub permissions: MergedPermissions,
    pub env: BTreeMap<String, MergedValue<String>>,
    pub hooks: BTreeMap<String, Vec<MergedValue<HookGroup>>>,
    pub disallowed_tools: Vec<MergedValue<String>>,
    pub attribution: Option<MergedValue<Attribution>>,
}

impl MergedConfig {
    pub fn is_empty(&self) -> bool {
        self.permissions.allow.is_empty()
            && self.permissions.deny.is_empty()
            && self.env.is_empty()
            && self.hooks.is_empty()
            && self.disallowed_tools.is_empty()
            && self.attribution.is_none()
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(|v| v.value.as_str())
    }

    /// Sources that contributed at least one value.
    pub fn sources(&self) -> BTreeSet<ConfigSource> {
        let mut sources = BTreeSet::new();
        sources.extend(self.permissions.allow.iter().map(|v| v.source));
        sources.extend(self.permissions.deny.iter().map(|v| v.source));
        sources.extend(self.env.values().map(|v| v.source));
        sources.extend(self.hooks.values().flatten().map(|v| v.source));
        sources.extend(self.disallowed_tools.iter().map(|v| v.source));
        sources.extend(self.attribution.iter().map(|v| v.source));
        sources
    }

    /// Rules of one kind attributed to `source`.
    pub fn rules_from(&self, kind: PermissionKind, source: ConfigSource) -> Vec<&str> {
        self.permissions
            .rules(kind)
            .iter()
            .filter(|v| v.source == source)
            .map(|v| v.value.as_str())
            .collect()
    }
}

/// Merge the three well-known layers. Absent documents count as empty.
pub fn merge(
    global: Option<&ConfigDocument>,
    project_shared: Option<&ConfigDocument>,
    project_local: Option<&ConfigDocument>,
) -> MergedConfig {
    let layers: Vec<(ConfigSource, &ConfigDocument)> = [
        (ConfigSource::Global, global),
        (ConfigSource::ProjectShared, project_shared),
        (ConfigSource::ProjectLocal, project_local),
    ]
    .into_iter()
    .filter_map(|(source, doc)| doc.map(|d| (source, d)))
    .collect();

    merge_layers(&layers)
}

/// Merge an arbitrary set of layers. Input order is irrelevant; layers are applied in
/// ascending precedence.
pub fn merge_layers(layers: &[(ConfigSource, &ConfigDocument)]) -> MergedConfig {
    let mut ordered: Vec<(ConfigSource, &ConfigDocument)> = layers.to_vec();
    ordered.sort_by_key(|(source, _)| source.precedence());

    MergedConfig {
        permissions: MergedPermissions {
            allow: union_lists(&ordered, |doc| doc.allow_rules()),
            deny: union_lists(&ordered, |doc| doc.deny_rules()),
        },
        env: override_env(&ordered),
        hooks: concat_hooks(&ordered),
        disallowed_tools: union_lists(&ordered, |doc| doc.disallowed_tools()),
        attribution: highest_attribution(&ordered),
    }
}

fn union_lists<'a, F>(
    layers: &[(ConfigSource, &'a ConfigDocument)],
    list: F,
) -> Vec<MergedValue<String>>
where
    F: Fn(&'a ConfigDocument) -> &'a [String],
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::new();
    for (source, doc) in layers {
        for value in list(*doc) {
            if seen.insert(value.as_str()) {
                merged.push(MergedValue::new(value.clone(), *source));
            }
        }
    }
    merged
}

fn override_env(layers: &[(ConfigSource, &ConfigDocument)]) -> BTreeMap<String, MergedValue<String>> {
    let mut merged = BTreeMap::new();
    for (source, doc) in layers {
        if let Some(env) = &doc.env {
            for (key, value) in env {
                merged.insert(key.clone(), MergedValue::new(value.clone(), *source));
            }
        }
    }
    merged
}

fn concat_hooks(
    layers: &[(ConfigSource, &ConfigDocument)],
) -> BTreeMap<String, Vec<MergedValue<HookGroup>>> {
    let mut merged: BTreeMap<String, Vec<MergedValue<HookGroup>>> = BTreeMap::new();
    for (source, doc) in layers {
        if let Some(hooks) = &doc.hooks {
            for (event, groups) in hooks {
                merged
                    .entry(event.clone())
                    .or_default()
                    .extend(groups.iter().map(|g| MergedValue::new(g.clone(), *source)));
            }
        }
    }
    merged
}

fn highest_attribution(
    layers: &[(ConfigSource, &ConfigDocument)],
) -> Option<MergedValue<Attribution>> {
    layers
        .iter()
        .rev()
        .find_map(|(source, doc)| {
            doc.attribution
                .as_ref()
                .map(|a| MergedValue::new(a.clone(), *source))
        })
}
