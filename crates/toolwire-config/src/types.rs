//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [timeouts]
//! handshake_secs = 10
//! call_secs = 30
//!
//! [[servers]]
//! name = "git"
//! command = "uvx"
//! args = ["mcp-server-git"]
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EntryDefect, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolwireConfig {
    /// Timeout policy.
    pub timeouts: TimeoutConfig,
    /// Configured servers, in file order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerEntry>,
}

impl ToolwireConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Timeouts merge field by field; servers merge by name, keeping the
    /// position of the entry being replaced.
    pub fn merge(&mut self, other: ToolwireConfig) {
        self.timeouts.merge(other.timeouts);

        for entry in other.servers {
            match self.servers.iter_mut().find(|s| s.name == entry.name) {
                Some(existing) => *existing = entry,
                None => self.servers.push(entry),
            }
        }
    }

    /// Look a server up by name, falling back to the built-in entries.
    pub fn server(&self, name: &str) -> Option<ServerEntry> {
        self.servers
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .or_else(|| ServerEntry::builtins().into_iter().find(|s| s.name == name))
    }

    /// Look a server up and check it can be launched.
    pub fn resolve_server(&self, name: &str) -> Result<ServerEntry> {
        let entry = self
            .server(name)
            .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))?;
        entry.validate()?;
        if !entry.enabled {
            return Err(ConfigError::bad_entry(&entry.name, EntryDefect::Disabled));
        }
        Ok(entry)
    }

    /// Configured servers followed by the built-ins they do not shadow.
    pub fn all_servers(&self) -> Vec<ServerEntry> {
        let mut all = self.servers.clone();
        for builtin in ServerEntry::builtins() {
            if !all.iter().any(|s| s.name == builtin.name) {
                all.push(builtin);
            }
        }
        all
    }

    /// Add or replace a server entry.
    pub fn upsert_server(&mut self, entry: ServerEntry) {
        self.merge(ToolwireConfig {
            timeouts: TimeoutConfig::default(),
            servers: vec![entry],
        });
    }

    /// Remove a configured server. Returns false if it was not configured.
    pub fn remove_server(&mut self, name: &str) -> bool {
        let before = self.servers.len();
        self.servers.retain(|s| s.name != name);
        self.servers.len() != before
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timeouts
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout policy (`[timeouts]`). Unset fields use the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on the `initialize` answer, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handshake_secs: Option<u64>,
    /// Bound on `tools/list` for a provisioned server, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_secs: Option<u64>,
    /// Bound on `tools/list` while a server may be provisioning, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_run_list_secs: Option<u64>,
    /// Bound on `tools/call`, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_secs: Option<u64>,
    /// Wait after closing the server's input, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin_close_grace_ms: Option<u64>,
    /// Wait after SIGTERM before killing, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate_grace_secs: Option<u64>,
    /// Bound on the diagnostic stderr read, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_probe_ms: Option<u64>,
}

impl TimeoutConfig {
    pub const DEFAULT_HANDSHAKE_SECS: u64 = 10;
    pub const DEFAULT_LIST_SECS: u64 = 10;
    pub const DEFAULT_FIRST_RUN_LIST_SECS: u64 = 100;
    pub const DEFAULT_CALL_SECS: u64 = 30;
    pub const DEFAULT_STDIN_CLOSE_GRACE_MS: u64 = 100;
    pub const DEFAULT_TERMINATE_GRACE_SECS: u64 = 3;
    pub const DEFAULT_STDERR_PROBE_MS: u64 = 1000;

    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs.unwrap_or(Self::DEFAULT_HANDSHAKE_SECS))
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_secs.unwrap_or(Self::DEFAULT_LIST_SECS))
    }

    pub fn first_run_list(&self) -> Duration {
        Duration::from_secs(
            self.first_run_list_secs
                .unwrap_or(Self::DEFAULT_FIRST_RUN_LIST_SECS),
        )
    }

    pub fn call(&self) -> Duration {
        Duration::from_secs(self.call_secs.unwrap_or(Self::DEFAULT_CALL_SECS))
    }

    pub fn stdin_close_grace(&self) -> Duration {
        Duration::from_millis(
            self.stdin_close_grace_ms
                .unwrap_or(Self::DEFAULT_STDIN_CLOSE_GRACE_MS),
        )
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_secs(
            self.terminate_grace_secs
                .unwrap_or(Self::DEFAULT_TERMINATE_GRACE_SECS),
        )
    }

    pub fn stderr_probe(&self) -> Duration {
        Duration::from_millis(self.stderr_probe_ms.unwrap_or(Self::DEFAULT_STDERR_PROBE_MS))
    }

    /// Overlay the fields set in `other`.
    pub fn merge(&mut self, other: TimeoutConfig) {
        self.handshake_secs = other.handshake_secs.or(self.handshake_secs);
        self.list_secs = other.list_secs.or(self.list_secs);
        self.first_run_list_secs = other.first_run_list_secs.or(self.first_run_list_secs);
        self.call_secs = other.call_secs.or(self.call_secs);
        self.stdin_close_grace_ms = other.stdin_close_grace_ms.or(self.stdin_close_grace_ms);
        self.terminate_grace_secs = other.terminate_grace_secs.or(self.terminate_grace_secs);
        self.stderr_probe_ms = other.stderr_probe_ms.or(self.stderr_probe_ms);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Servers
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a single MCP server (`[[servers]]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Unique name for this server.
    pub name: String,
    /// Command to execute to start the server.
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Client name presented in the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Whether the server may install itself on first launch.
    #[serde(default)]
    pub first_run: bool,
    /// Whether this server is enabled. Defaults to true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Environment overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl ServerEntry {
    /// Create a new server entry.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            client_name: None,
            first_run: false,
            enabled: true,
            env: BTreeMap::new(),
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the client name presented in the handshake.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Mark the server as provisioning itself on first launch.
    pub fn with_first_run(mut self, first_run: bool) -> Self {
        self.first_run = first_run;
        self
    }

    /// Set enabled state.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The command line as a single string.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check that the entry can be launched.
    pub fn validate(&self) -> Result<()> {
        let defect = if self.name.trim().is_empty() {
            Some(EntryDefect::EmptyName)
        } else if self.command.trim().is_empty() {
            Some(EntryDefect::EmptyCommand)
        } else {
            self.env
                .keys()
                .find(|key| key.is_empty() || key.contains('=') || key.contains('\0'))
                .map(|key| EntryDefect::BadEnvKey(key.clone()))
        };
        match defect {
            Some(defect) => Err(ConfigError::bad_entry(&self.name, defect)),
            None => Ok(()),
        }
    }

    /// Entries available without any configuration.
    pub fn builtins() -> Vec<ServerEntry> {
        vec![
            ServerEntry::new("git", "uvx")
                .with_arg("mcp-server-git")
                .with_client_name("git-mcp-client"),
            ServerEntry::new("aws-docs", "uvx")
                .with_arg("awslabs.aws-documentation-mcp-server@latest")
                .with_env("FASTMCP_LOG_LEVEL", "ERROR")
                .with_client_name("aws-docs-client")
                .with_first_run(true),
        ]
    }

    /// Check if this entry is one of the built-ins, unchanged.
    pub fn is_builtin(&self) -> bool {
        Self::builtins().contains(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = ToolwireConfig::from_toml("").unwrap();
        assert_eq!(config, ToolwireConfig::new());
        assert_eq!(config.timeouts.handshake(), Duration::from_secs(10));
        assert_eq!(config.timeouts.call(), Duration::from_secs(30));
        assert_eq!(config.timeouts.first_run_list(), Duration::from_secs(100));
        assert_eq!(config.timeouts.stdin_close_grace(), Duration::from_millis(100));
        assert_eq!(config.timeouts.terminate_grace(), Duration::from_secs(3));
        assert_eq!(config.timeouts.stderr_probe(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[timeouts]
handshake_secs = 5
call_secs = 60
stdin_close_grace_ms = 250

[[servers]]
name = "sqlite"
command = "mcp-server-sqlite"
args = ["--db", "/tmp/test.db"]
env = { DEBUG = "1" }
client_name = "sqlite-client"

[[servers]]
name = "disabled"
command = "something"
enabled = false
"#;
        let config = ToolwireConfig::from_toml(toml).unwrap();
        assert_eq!(config.timeouts.handshake(), Duration::from_secs(5));
        assert_eq!(config.timeouts.call(), Duration::from_secs(60));
        assert_eq!(config.timeouts.list(), Duration::from_secs(10));
        assert_eq!(config.timeouts.stdin_close_grace(), Duration::from_millis(250));

        let sqlite = &config.servers[0];
        assert_eq!(sqlite.display_command(), "mcp-server-sqlite --db /tmp/test.db");
        assert_eq!(sqlite.env.get("DEBUG").map(String::as_str), Some("1"));
        assert_eq!(sqlite.client_name.as_deref(), Some("sqlite-client"));
        assert!(sqlite.enabled);
        assert!(!sqlite.first_run);
        assert!(!config.servers[1].enabled);
    }

    #[test]
    fn test_round_trip() {
        let mut config = ToolwireConfig::new();
        config.timeouts.call_secs = Some(45);
        config.upsert_server(ServerEntry::new("test", "cmd").with_arg("-v").with_env("K", "V"));

        let toml = config.to_toml().unwrap();
        assert!(toml.contains("call_secs = 45"));
        assert!(!toml.contains("handshake_secs"));

        let parsed = ToolwireConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_merge_timeouts_field_by_field() {
        let mut base = ToolwireConfig::from_toml("[timeouts]\nhandshake_secs = 5\ncall_secs = 20").unwrap();
        let over = ToolwireConfig::from_toml("[timeouts]\ncall_secs = 90").unwrap();
        base.merge(over);
        assert_eq!(base.timeouts.handshake(), Duration::from_secs(5));
        assert_eq!(base.timeouts.call(), Duration::from_secs(90));
    }

    #[test]
    fn test_merge_servers_by_name() {
        let mut base = ToolwireConfig::new();
        base.upsert_server(ServerEntry::new("a", "one"));
        base.upsert_server(ServerEntry::new("b", "two"));

        let mut over = ToolwireConfig::new();
        over.upsert_server(ServerEntry::new("a", "replaced"));
        over.upsert_server(ServerEntry::new("c", "three"));
        base.merge(over);

        let names: Vec<&str> = base.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(base.servers[0].command, "replaced");
    }

    #[test]
    fn test_builtins_available_without_config() {
        let config = ToolwireConfig::new();
        let git = config.server("git").unwrap();
        assert_eq!(git.display_command(), "uvx mcp-server-git");
        assert!(git.is_builtin());

        let docs = config.server("aws-docs").unwrap();
        assert!(docs.first_run);
        assert_eq!(docs.env.get("FASTMCP_LOG_LEVEL").map(String::as_str), Some("ERROR"));

        assert!(config.server("nope").is_none());
        assert_eq!(config.all_servers().len(), 2);
    }

    #[test]
    fn test_configured_server_shadows_builtin() {
        let mut config = ToolwireConfig::new();
        config.upsert_server(
            ServerEntry::new("git", "mcp-server-git").with_arg("--repository").with_arg("."),
        );
        let git = config.server("git").unwrap();
        assert_eq!(git.command, "mcp-server-git");
        assert!(!git.is_builtin());
        assert_eq!(config.all_servers().len(), 2);
    }

    #[test]
    fn test_resolve_server_errors() {
        let mut config = ToolwireConfig::new();
        config.upsert_server(ServerEntry::new("off", "cmd").with_enabled(false));
        config.upsert_server(ServerEntry::new("blank", "  "));

        assert!(matches!(
            config.resolve_server("missing"),
            Err(ConfigError::UnknownServer(_))
        ));
        let err = config.resolve_server("off").unwrap_err();
        assert!(err.to_string().contains("disabled"));
        let err = config.resolve_server("blank").unwrap_err();
        assert!(err.to_string().contains("command is empty"));
        assert!(config.resolve_server("git").is_ok());
    }

    #[test]
    fn test_validate_env_keys() {
        let entry = ServerEntry::new("x", "cmd").with_env("GOOD", "1");
        assert!(entry.validate().is_ok());

        let entry = ServerEntry::new("x", "cmd").with_env("A=B", "1");
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::BadEntry {
                defect: EntryDefect::BadEnvKey(_),
                ..
            })
        ));
    }

    #[test]
    fn test_remove_server() {
        let mut config = ToolwireConfig::new();
        config.upsert_server(ServerEntry::new("test", "cmd"));
        assert!(config.remove_server("test"));
        assert!(!config.remove_server("test"));
        assert!(config.servers.is_empty());
    }
}
