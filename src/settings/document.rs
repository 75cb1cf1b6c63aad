//! Typed model of one settings file.
//!
//! Every struct keeps an `additional_properties` bag so keys Fig does not model
//! survive a read/write cycle unchanged. A known key is typed only when it holds a
//! non-null value: an absent key stays `None` and is not written back, and an
//! explicit `null` stays in the bag and is written back as `null`. A typed value
//! set later takes the key's place in the output.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Keys not covered by the typed model, re-emitted verbatim on encode.
pub type AdditionalProperties = BTreeMap<String, Value>;

/// Move the value of `key` out of `bag` and decode it. Absent and null keys give
/// `None`; a null stays in the bag.
pub(crate) fn take_field<T: DeserializeOwned>(
    bag: &mut AdditionalProperties,
    key: &str,
) -> Result<Option<T>, String> {
    if matches!(bag.get(key), None | Some(Value::Null)) {
        return Ok(None);
    }
    match bag.remove(key) {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| format!("invalid `{}`: {}", key, e)),
        None => Ok(None),
    }
}

/// Write a typed value back under `key`, replacing any placeholder.
pub(crate) fn put_field(bag: &mut AdditionalProperties, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        bag.insert(key.to_string(), value);
    }
}

pub(crate) fn object(bag: AdditionalProperties) -> Value {
    Value::Object(bag.into_iter().collect())
}

pub(crate) fn string_map(map: BTreeMap<String, String>) -> Value {
    Value::Object(map.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
}

/// One settings document (`settings.json` / `settings.local.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct ConfigDocument {
    pub permissions: Option<Permissions>,
    pub env: Option<BTreeMap<String, String>>,
    pub hooks: Option<BTreeMap<String, Vec<HookGroup>>>,
    /// `disallowedTools`
    pub disallowed_tools: Option<Vec<String>>,
    pub attribution: Option<Attribution>,
    pub additional_properties: AdditionalProperties,
}

impl TryFrom<AdditionalProperties> for ConfigDocument {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            permissions: take_field(&mut bag, "permissions")?,
            env: take_field(&mut bag, "env")?,
            hooks: take_field(&mut bag, "hooks")?,
            disallowed_tools: take_field(&mut bag, "disallowedTools")?,
            attribution: take_field(&mut bag, "attribution")?,
            additional_properties: bag,
        })
    }
}

impl From<ConfigDocument> for AdditionalProperties {
    fn from(doc: ConfigDocument) -> Self {
        let mut bag = doc.additional_properties;
        put_field(&mut bag, "permissions", doc.permissions.map(|p| object(p.into())));
        put_field(&mut bag, "env", doc.env.map(string_map));
        put_field(
            &mut bag,
            "hooks",
            doc.hooks.map(|hooks| {
                Value::Object(
                    hooks
                        .into_iter()
                        .map(|(event, groups)| {
                            let groups = groups.into_iter().map(|g| object(g.into())).collect();
                            (event, Value::Array(groups))
                        })
                        .collect(),
                )
            }),
        );
        put_field(&mut bag, "disallowedTools", doc.disallowed_tools.map(Value::from));
        put_field(&mut bag, "attribution", doc.attribution.map(|a| object(a.into())));
        bag
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct Permissions {
    pub allow: Option<Vec<String>>,
    pub deny: Option<Vec<String>>,
    pub additional_properties: AdditionalProperties,
}

impl TryFrom<AdditionalProperties> for Permissions {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            allow: take_field(&mut bag, "allow")?,
            deny: take_field(&mut bag, "deny")?,
            additional_properties: bag,
        })
    }
}

impl From<Permissions> for AdditionalProperties {
    fn from(permissions: Permissions) -> Self {
        let mut bag = permissions.additional_properties;
        put_field(&mut bag, "allow", permissions.allow.map(Value::from));
        put_field(&mut bag, "deny", permissions.deny.map(Value::from));
        bag
    }
}

/// Hooks registered for one matcher under an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct HookGroup {
    pub matcher: Option<String>,
    pub hooks: Option<Vec<HookDefinition>>,
    pub additional_properties: AdditionalProperties,
}

impl HookGroup {
    pub fn definitions(&self) -> &[HookDefinition] {
        self.hooks.as_deref().unwrap_or(&[])
    }
}

impl TryFrom<AdditionalProperties> for HookGroup {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            matcher: take_field(&mut bag, "matcher")?,
            hooks: take_field(&mut bag, "hooks")?,
            additional_properties: bag,
        })
    }
}

impl From<HookGroup> for AdditionalProperties {
    fn from(group: HookGroup) -> Self {
        let mut bag = group.additional_properties;
        put_field(&mut bag, "matcher", group.matcher.map(Value::String));
        put_field(
            &mut bag,
            "hooks",
            group
                .hooks
                .map(|hooks| Value::Array(hooks.into_iter().map(|h| object(h.into())).collect())),
        );
        bag
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct HookDefinition {
    /// `type`
    pub hook_type: Option<String>,
    pub command: Option<String>,
    pub additional_properties: AdditionalProperties,
}

impl TryFrom<AdditionalProperties> for HookDefinition {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            hook_type: take_field(&mut bag, "type")?,
            command: take_field(&mut bag, "command")?,
            additional_properties: bag,
        })
    }
}

impl From<HookDefinition> for AdditionalProperties {
    fn from(hook: HookDefinition) -> Self {
        let mut bag = hook.additional_properties;
        put_field(&mut bag, "type", hook.hook_type.map(Value::String));
        put_field(&mut bag, "command", hook.command.map(Value::String));
        bag
    }
}

/// Commit and pull-request attribution preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct Attribution {
    pub commits: Option<bool>,
    /// `pullRequests`
    pub pull_requests: Option<bool>,
    pub additional_properties: AdditionalProperties,
}

impl TryFrom<AdditionalProperties> for Attribution {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            commits: take_field(&mut bag, "commits")?,
            pull_requests: take_field(&mut bag, "pullRequests")?,
            additional_properties: bag,
        })
    }
}

impl From<Attribution> for AdditionalProperties {
    fn from(attribution: Attribution) -> Self {
        let mut bag = attribution.additional_properties;
        put_field(&mut bag, "commits", attribution.commits.map(Value::Bool));
        put_field(&mut bag, "pullRequests", attribution.pull_requests.map(Value::Bool));
        bag
    }
}

/// Which permission list a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Allow,
    Deny,
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionKind::Allow => f.write_str("allow"),
            PermissionKind::Deny => f.write_str("deny"),
        }
    }
}

impl Permissions {
    pub fn rules(&self, kind: PermissionKind) -> &[String] {
        let list = match kind {
            PermissionKind::Allow => &self.allow,
            PermissionKind::Deny => &self.deny,
        };
        list.as_deref().unwrap_or(&[])
    }

    pub(crate) fn list_mut(&mut self, kind: PermissionKind) -> &mut Option<Vec<String>> {
        match kind {
            PermissionKind::Allow => &mut self.allow,
            PermissionKind::Deny => &mut self.deny,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_none() && self.deny.is_none() && self.additional_properties.is_empty()
    }
}

impl ConfigDocument {
    pub fn rules(&self, kind: PermissionKind) -> &[String] {
        self.permissions
            .as_ref()
            .map(|p| p.rules(kind))
            .unwrap_or(&[])
    }

    pub fn allow_rules(&self) -> &[String] {
        self.rules(PermissionKind::Allow)
    }

    pub fn deny_rules(&self) -> &[String] {
        self.rules(PermissionKind::Deny)
    }

    pub fn disallowed_tools(&self) -> &[String] {
        self.disallowed_tools.as_deref().unwrap_or(&[])
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.as_ref()?.get(key).map(String::as_str)
    }

    pub fn hook_groups(&self, event: &str) -> &[HookGroup] {
        self.hooks
            .as_ref()
            .and_then(|h| h.get(event))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True when the document would encode to `{}`.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_none()
            && self.env.is_none()
            && self.hooks.is_none()
            && self.disallowed_tools.is_none()
            && self.attribution.is_none()
            && self.additional_properties.is_empty()
    }
}
