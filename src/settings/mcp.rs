//! MCP server definitions stored in `~/.claude.json` and `<project>/.mcp.json`.

use super::document::{object, put_field, string_map, take_field, AdditionalProperties};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One MCP server entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct McpServer {
    /// `type`
    pub server_type: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
    pub url: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub additional_properties: AdditionalProperties,
}

impl TryFrom<AdditionalProperties> for McpServer {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            server_type: take_field(&mut bag, "type")?,
            command: take_field(&mut bag, "command")?,
            args: take_field(&mut bag, "args")?,
            env: take_field(&mut bag, "env")?,
            url: take_field(&mut bag, "url")?,
            headers: take_field(&mut bag, "headers")?,
            additional_properties: bag,
        })
    }
}

impl From<McpServer> for AdditionalProperties {
    fn from(server: McpServer) -> Self {
        let mut bag = server.additional_properties;
        put_field(&mut bag, "type", server.server_type.map(Value::String));
        put_field(&mut bag, "command", server.command.map(Value::String));
        put_field(&mut bag, "args", server.args.map(Value::from));
        put_field(&mut bag, "env", server.env.map(string_map));
        put_field(&mut bag, "url", server.url.map(Value::String));
        put_field(&mut bag, "headers", server.headers.map(string_map));
        bag
    }
}

fn server_map(servers: BTreeMap<String, McpServer>) -> Value {
    Value::Object(
        servers
            .into_iter()
            .map(|(name, server)| (name, object(server.into())))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransport {
    Stdio,
    Http,
    Sse,
    Unknown,
}

impl fmt::Display for McpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            McpTransport::Stdio => "stdio",
            McpTransport::Http => "http",
            McpTransport::Sse => "sse",
            McpTransport::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl McpServer {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: Some(command.into()),
            args: if args.is_empty() { None } else { Some(args) },
            ..Self::default()
        }
    }

    pub fn transport(&self) -> McpTransport {
        match self.server_type.as_deref() {
            Some("stdio") => McpTransport::Stdio,
            Some("http") => McpTransport::Http,
            Some("sse") => McpTransport::Sse,
            Some(_) => McpTransport::Unknown,
            None if self.command.is_some() => McpTransport::Stdio,
            None if self.url.is_some() => McpTransport::Http,
            None => McpTransport::Unknown,
        }
    }
}

/// `<project>/.mcp.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct McpConfig {
    /// `mcpServers`
    pub mcp_servers: Option<BTreeMap<String, McpServer>>,
    pub additional_properties: AdditionalProperties,
}

impl TryFrom<AdditionalProperties> for McpConfig {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            mcp_servers: take_field(&mut bag, "mcpServers")?,
            additional_properties: bag,
        })
    }
}

impl From<McpConfig> for AdditionalProperties {
    fn from(config: McpConfig) -> Self {
        let mut bag = config.additional_properties;
        put_field(&mut bag, "mcpServers", config.mcp_servers.map(server_map));
        bag
    }
}

/// Per-project entry inside `~/.claude.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct ProjectEntry {
    pub mcp_servers: Option<BTreeMap<String, McpServer>>,
    pub additional_properties: AdditionalProperties,
}

impl TryFrom<AdditionalProperties> for ProjectEntry {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            mcp_servers: take_field(&mut bag, "mcpServers")?,
            additional_properties: bag,
        })
    }
}

impl From<ProjectEntry> for AdditionalProperties {
    fn from(entry: ProjectEntry) -> Self {
        let mut bag = entry.additional_properties;
        put_field(&mut bag, "mcpServers", entry.mcp_servers.map(server_map));
        bag
    }
}

/// `~/.claude.json`: project registry plus global MCP servers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AdditionalProperties", into = "AdditionalProperties")]
pub struct GlobalRegistry {
    pub projects: Option<BTreeMap<String, ProjectEntry>>,
    pub mcp_servers: Option<BTreeMap<String, McpServer>>,
    pub additional_properties: AdditionalProperties,
}

impl TryFrom<AdditionalProperties> for GlobalRegistry {
    type Error = String;

    fn try_from(mut bag: AdditionalProperties) -> Result<Self, Self::Error> {
        Ok(Self {
            projects: take_field(&mut bag, "projects")?,
            mcp_servers: take_field(&mut bag, "mcpServers")?,
            additional_properties: bag,
        })
    }
}

impl From<GlobalRegistry> for AdditionalProperties {
    fn from(registry: GlobalRegistry) -> Self {
        let mut bag = registry.additional_properties;
        put_field(
            &mut bag,
            "projects",
            registry.projects.map(|projects| {
                Value::Object(
                    projects
                        .into_iter()
                        .map(|(path, entry)| (path, object(entry.into())))
                        .collect(),
                )
            }),
        );
        put_field(&mut bag, "mcpServers", registry.mcp_servers.map(server_map));
        bag
    }
}

/// Shared access to the `mcpServers` map of either file shape.
pub trait McpServerMap {
    fn servers(&self) -> Option<&BTreeMap<String, McpServer>>;
    fn servers_mut(&mut self) -> &mut BTreeMap<String, McpServer>;

    fn server(&self, name: &str) -> Option<&McpServer> {
        self.servers()?.get(name)
    }

    fn contains_server(&self, name: &str) -> bool {
        self.server(name).is_some()
    }
}

impl McpServerMap for McpConfig {
    fn servers(&self) -> Option<&BTreeMap<String, McpServer>> {
        self.mcp_servers.as_ref()
    }

    fn servers_mut(&mut self) -> &mut BTreeMap<String, McpServer> {
        self.mcp_servers.get_or_insert_with(BTreeMap::new)
    }
}

impl McpServerMap for GlobalRegistry {
    fn servers(&self) -> Option<&BTreeMap<String, McpServer>> {
        self.mcp_servers.as_ref()
    }

    fn servers_mut(&mut self) -> &mut BTreeMap<String, McpServer> {
        self.mcp_servers.get_or_insert_with(BTreeMap::new)
    }
}

impl GlobalRegistry {
    /// Project paths recorded in the registry, sorted.
    pub fn registered_projects(&self) -> Vec<String> {
        self.projects
            .as_ref()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }
}
