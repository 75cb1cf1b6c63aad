//! Settings data model
//!
//! Typed, lossless representations of the settings and MCP files, and the sources
//! (with their precedence) those files come from.

pub mod document;
pub mod mcp;
pub mod source;

pub use document::{
    AdditionalProperties, Attribution, ConfigDocument, HookDefinition, HookGroup,
    PermissionKind, Permissions,
};
pub use mcp::{GlobalRegistry, McpConfig, McpServer, McpServerMap, McpTransport, ProjectEntry};
pub use source::{ConfigPaths, ConfigSource};
