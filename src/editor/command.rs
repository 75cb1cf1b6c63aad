//! Reversible document edits.
//!
//! Applying a command returns its exact inverse, computed against the document it was
//! applied to. Inserts that had to create a missing list or section hand their inverse
//! a [`Prune`] level so undo removes those containers again.

use crate::error::ValidationError;
use crate::settings::{Attribution, ConfigDocument, HookGroup, PermissionKind, Permissions};
use std::collections::{BTreeMap, VecDeque};

/// Maximum number of undo entries kept per session
pub const UNDO_LIMIT: usize = 100;

/// Containers a removal should drop once they become empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Prune {
    Nothing,
    /// The list (or map) holding the entry
    List,
    /// The list and its enclosing section (`permissions`, `hooks`)
    Section,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    InsertRule {
        kind: PermissionKind,
        index: Option<usize>,
        rule: String,
    },
    RemoveRule {
        kind: PermissionKind,
        index: usize,
        rule: String,
        prune: Prune,
    },
    ReplaceRule {
        kind: PermissionKind,
        index: usize,
        from: String,
        to: String,
    },
    SetEnv {
        key: String,
        value: Option<String>,
        prune: Prune,
    },
    InsertTool {
        index: Option<usize>,
        tool: String,
    },
    RemoveTool {
        index: usize,
        tool: String,
        prune: Prune,
    },
    InsertHookGroup {
        event: String,
        index: Option<usize>,
        group: HookGroup,
    },
    RemoveHookGroup {
        event: String,
        index: usize,
        prune: Prune,
    },
    SetAttribution {
        value: Option<Attribution>,
    },
}

impl EditCommand {
    /// Short description for logs and undo menus.
    pub fn describe(&self) -> String {
        match self {
            EditCommand::InsertRule { kind, rule, .. } => format!("add {} rule {}", kind, rule),
            EditCommand::RemoveRule { kind, rule, .. } => format!("remove {} rule {}", kind, rule),
            EditCommand::ReplaceRule { kind, from, to, .. } => {
                format!("change {} rule {} to {}", kind, from, to)
            }
            EditCommand::SetEnv { key, value: Some(_), .. } => format!("set env {}", key),
            EditCommand::SetEnv { key, value: None, .. } => format!("unset env {}", key),
            EditCommand::InsertTool { tool, .. } => format!("disallow tool {}", tool),
            EditCommand::RemoveTool { tool, .. } => format!("allow tool {}", tool),
            EditCommand::InsertHookGroup { event, .. } => format!("add {} hook group", event),
            EditCommand::RemoveHookGroup { event, index, .. } => {
                format!("remove {} hook group {}", event, index)
            }
            EditCommand::SetAttribution { .. } => "change attribution".to_string(),
        }
    }

    /// Apply to `doc`, returning the command that reverts it.
    pub fn apply(&self, doc: &mut ConfigDocument) -> Result<EditCommand, ValidationError> {
        match self {
            EditCommand::InsertRule { kind, index, rule } => {
                let created = if doc.permissions.is_none() {
                    Prune::Section
                } else if doc.permissions.as_ref().and_then(|p| rule_list(p, *kind)).is_none() {
                    Prune::List
                } else {
                    Prune::Nothing
                };
                let list = doc
                    .permissions
                    .get_or_insert_with(Permissions::default)
                    .list_mut(*kind)
                    .get_or_insert_with(Vec::new);
                let at = insert_at(list, *index, rule.clone());
                Ok(EditCommand::RemoveRule {
                    kind: *kind,
                    index: at,
                    rule: rule.clone(),
                    prune: created,
                })
            }

            EditCommand::RemoveRule {
                kind,
                index,
                rule,
                prune,
            } => {
                let not_found = || ValidationError::RuleNotFound {
                    rule: rule.clone(),
                    kind: kind.to_string(),
                };
                let permissions = doc.permissions.as_mut().ok_or_else(not_found)?;
                let slot = permissions.list_mut(*kind);
                let list = slot.as_mut().ok_or_else(not_found)?;
                let at = locate(list, *index, |r| r == rule).ok_or_else(not_found)?;
                list.remove(at);

                if *prune >= Prune::List && list.is_empty() {
                    *slot = None;
                }
                if *prune == Prune::Section && permissions.is_empty() {
                    doc.permissions = None;
                }
                Ok(EditCommand::InsertRule {
                    kind: *kind,
                    index: Some(at),
                    rule: rule.clone(),
                })
            }

            EditCommand::ReplaceRule {
                kind,
                index,
                from,
                to,
            } => {
                let not_found = || ValidationError::RuleNotFound {
                    rule: from.clone(),
                    kind: kind.to_string(),
                };
                let list = doc
                    .permissions
                    .as_mut()
                    .and_then(|p| p.list_mut(*kind).as_mut())
                    .ok_or_else(not_found)?;
                let at = locate(list, *index, |r| r == from).ok_or_else(not_found)?;
                list[at] = to.clone();
                Ok(EditCommand::ReplaceRule {
                    kind: *kind,
                    index: at,
                    from: to.clone(),
                    to: from.clone(),
                })
            }

            EditCommand::SetEnv { key, value, prune } => {
                let previous = doc.env_var(key).map(str::to_string);
                match value {
                    Some(value) => {
                        let created = doc.env.is_none();
                        doc.env
                            .get_or_insert_with(BTreeMap::new)
                            .insert(key.clone(), value.clone());
                        Ok(EditCommand::SetEnv {
                            key: key.clone(),
                            value: previous,
                            prune: if created { Prune::List } else { Prune::Nothing },
                        })
                    }
                    None => {
                        let env = doc
                            .env
                            .as_mut()
                            .filter(|env| env.contains_key(key))
                            .ok_or_else(|| ValidationError::EnvVarNotFound(key.clone()))?;
                        env.remove(key);
                        if *prune >= Prune::List && env.is_empty() {
                            doc.env = None;
                        }
                        Ok(EditCommand::SetEnv {
                            key: key.clone(),
                            value: previous,
                            prune: Prune::Nothing,
                        })
                    }
                }
            }

            EditCommand::InsertTool { index, tool } => {
                let created = if doc.disallowed_tools.is_none() {
                    Prune::List
                } else {
                    Prune::Nothing
                };
                let list = doc.disallowed_tools.get_or_insert_with(Vec::new);
                let at = insert_at(list, *index, tool.clone());
                Ok(EditCommand::RemoveTool {
                    index: at,
                    tool: tool.clone(),
                    prune: created,
                })
            }

            EditCommand::RemoveTool { index, tool, prune } => {
                let list = doc
                    .disallowed_tools
                    .as_mut()
                    .ok_or_else(|| ValidationError::ToolNotFound(tool.clone()))?;
                let at = locate(list, *index, |t| t == tool)
                    .ok_or_else(|| ValidationError::ToolNotFound(tool.clone()))?;
                list.remove(at);
                if *prune >= Prune::List && list.is_empty() {
                    doc.disallowed_tools = None;
                }
                Ok(EditCommand::InsertTool {
                    index: Some(at),
                    tool: tool.clone(),
                })
            }

            EditCommand::InsertHookGroup {
                event,
                index,
                group,
            } => {
                let created = match &doc.hooks {
                    None => Prune::Section,
                    Some(hooks) if !hooks.contains_key(event) => Prune::List,
                    Some(_) => Prune::Nothing,
                };
                let groups = doc
                    .hooks
                    .get_or_insert_with(BTreeMap::new)
                    .entry(event.clone())
                    .or_default();
                let at = insert_at(groups, *index, group.clone());
                Ok(EditCommand::RemoveHookGroup {
                    event: event.clone(),
                    index: at,
                    prune: created,
                })
            }

            EditCommand::RemoveHookGroup {
                event,
                index,
                prune,
            } => {
                let not_found = || ValidationError::HookGroupNotFound {
                    event: event.clone(),
                    index: *index,
                };
                let hooks = doc.hooks.as_mut().ok_or_else(not_found)?;
                let groups = hooks.get_mut(event).ok_or_else(not_found)?;
                if *index >= groups.len() {
                    return Err(not_found());
                }
                let group = groups.remove(*index);
                if *prune >= Prune::List && groups.is_empty() {
                    hooks.remove(event);
                }
                if *prune == Prune::Section && hooks.is_empty() {
                    doc.hooks = None;
                }
                Ok(EditCommand::InsertHookGroup {
                    event: event.clone(),
                    index: Some(*index),
                    group,
                })
            }

            EditCommand::SetAttribution { value } => {
                let previous = std::mem::replace(&mut doc.attribution, value.clone());
                Ok(EditCommand::SetAttribution { value: previous })
            }
        }
    }
}

/// Undo and redo stacks of pending commands.
///
/// The undo stack holds inverses of applied edits; the redo stack holds the commands
/// that re-apply undone edits.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<EditCommand>,
    redo: Vec<EditCommand>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(UNDO_LIMIT)
    }
}

impl History {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Apply `command` to `doc` and remember its inverse. Clears the redo stack.
    pub fn execute(
        &mut self,
        command: &EditCommand,
        doc: &mut ConfigDocument,
    ) -> Result<(), ValidationError> {
        let inverse = command.apply(doc)?;
        self.push_undo(inverse);
        self.redo.clear();
        Ok(())
    }

    /// Revert the most recent edit. `Ok(None)` when there is nothing to undo.
    pub fn undo(&mut self, doc: &mut ConfigDocument) -> Result<Option<String>, ValidationError> {
        let Some(inverse) = self.undo.pop_back() else {
            return Ok(None);
        };
        match inverse.apply(doc) {
            Ok(forward) => {
                let description = forward.describe();
                self.redo.push(forward);
                Ok(Some(description))
            }
            Err(e) => {
                self.undo.push_back(inverse);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone edit. `Ok(None)` when there is nothing to redo.
    pub fn redo(&mut self, doc: &mut ConfigDocument) -> Result<Option<String>, ValidationError> {
        let Some(forward) = self.redo.pop() else {
            return Ok(None);
        };
        match forward.apply(doc) {
            Ok(inverse) => {
                let description = forward.describe();
                self.push_undo(inverse);
                Ok(Some(description))
            }
            Err(e) => {
                self.redo.push(forward);
                Err(e)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, inverse: EditCommand) {
        self.undo.push_back(inverse);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }
}

fn rule_list(permissions: &Permissions, kind: PermissionKind) -> Option<&Vec<String>> {
    match kind {
        PermissionKind::Allow => permissions.allow.as_ref(),
        PermissionKind::Deny => permissions.deny.as_ref(),
    }
}

fn insert_at<T>(list: &mut Vec<T>, index: Option<usize>, value: T) -> usize {
    let at = index.unwrap_or(list.len()).min(list.len());
    list.insert(at, value);
    at
}

/// Position of the matching entry, preferring the recorded index.
fn locate<T, F>(list: &[T], hint: usize, matches: F) -> Option<usize>
where
    F: Fn(&T) -> bool,
{
    if list.get(hint).map(&matches).unwrap_or(false) {
        return Some(hint);
    }
    list.iter().position(matches)
}
