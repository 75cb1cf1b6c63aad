//! Input checks applied before an edit is accepted.

use crate::error::ValidationError;
use crate::settings::{ConfigDocument, PermissionKind};
use regex_lite::Regex;
use std::sync::OnceLock;

fn rule_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*(\([^)]*\))?$").expect("rule pattern is valid")
    })
}

fn tool_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*$").expect("tool pattern is valid"))
}

/// Trim and check a permission rule's shape: `Tool` or `Tool(specifier)`.
pub fn validate_rule(rule: &str) -> Result<String, ValidationError> {
    let rule = rule.trim();
    if rule.is_empty() {
        return Err(ValidationError::EmptyRule);
    }
    if !rule_pattern().is_match(rule) {
        return Err(ValidationError::InvalidRuleFormat(rule.to_string()));
    }
    Ok(rule.to_string())
}

/// Validate a new rule and reject it if the same kind already has it.
pub fn validate_new_rule(
    document: &ConfigDocument,
    kind: PermissionKind,
    rule: &str,
) -> Result<String, ValidationError> {
    let rule = validate_rule(rule)?;
    if document.rules(kind).iter().any(|r| *r == rule) {
        return Err(ValidationError::DuplicateRule {
            rule,
            kind: kind.to_string(),
        });
    }
    Ok(rule)
}

pub fn validate_env_key(key: &str) -> Result<String, ValidationError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ValidationError::EmptyEnvKey);
    }
    if key.contains('=') || key.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEnvKey(key.to_string()));
    }
    Ok(key.to_string())
}

pub fn validate_tool_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if !tool_pattern().is_match(name) {
        return Err(ValidationError::InvalidToolName(name.to_string()));
    }
    Ok(name.to_string())
}
