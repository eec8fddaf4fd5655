//! Lifecycle management for several MCP servers.
//!
//! Each [`McpClient`] owns its own process and pipes, so the manager holds
//! no shared state beyond the name → client map. It exists so callers (an
//! interrupt handler in particular) have a single place to tear everything
//! down.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolwire_mcp::{Backend, McpManager};
//!
//! let mut manager = McpManager::new();
//! manager.add(Backend::Git.client());
//! manager.add(Backend::AwsDocs.client());
//!
//! let connected = manager.connect_all().await;
//! let tools = manager.list_all_tools().await;
//!
//! manager.disconnect_all().await;
//! ```

use std::collections::BTreeMap;

use crate::client::McpClient;
use crate::protocol::ToolInfo;

/// Manager for multiple MCP server connections.
#[derive(Default)]
pub struct McpManager {
    clients: BTreeMap<String, McpClient>,
}

impl McpManager {
    /// Create a new empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client, keyed by its name.
    ///
    /// A client already registered under the same name is returned so the
    /// caller can disconnect it.
    pub fn add(&mut self, client: McpClient) -> Option<McpClient> {
        let name = client.name().to_string();
        tracing::debug!(server = %name, "adding MCP server");
        self.clients.insert(name, client)
    }

    /// Check if a server with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    /// Registered server names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.clients.keys().map(String::as_str).collect()
    }

    /// Number of registered servers.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if no servers are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Number of clients ready for requests.
    pub fn ready_count(&self) -> usize {
        self.clients.values().filter(|c| c.is_ready()).count()
    }

    /// Borrow a client mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut McpClient> {
        self.clients.get_mut(name)
    }

    /// Borrow a client.
    pub fn get(&self, name: &str) -> Option<&McpClient> {
        self.clients.get(name)
    }

    /// Connect every client that is not ready yet.
    ///
    /// Failures are logged and skipped. Returns how many clients are ready
    /// afterwards.
    pub async fn connect_all(&mut self) -> usize {
        for (name, client) in &mut self.clients {
            if client.is_ready() {
                tracing::debug!(server = %name, "server already connected, skipping");
                continue;
            }
            if let Err(e) = client.connect().await {
                tracing::error!(server = %name, error = %e, "failed to connect to MCP server");
            }
        }

        let ready = self.ready_count();
        tracing::info!(
            connected = ready,
            total = self.clients.len(),
            "MCP server connections complete"
        );
        ready
    }

    /// List tools on every ready client.
    ///
    /// Servers whose listing fails are logged and left out.
    pub async fn list_all_tools(&mut self) -> BTreeMap<String, Vec<ToolInfo>> {
        let mut all = BTreeMap::new();
        for (name, client) in &mut self.clients {
            if !client.is_ready() {
                continue;
            }
            let listing = client.list_tools().await;
            match listing.error {
                None => {
                    all.insert(name.clone(), listing.tools);
                }
                Some(e) => {
                    tracing::warn!(server = %name, error = %e, "skipping server in tool listing");
                }
            }
        }
        all
    }

    /// Disconnect one client. Returns false if no such client exists.
    pub async fn disconnect(&mut self, name: &str) -> bool {
        match self.clients.get_mut(name) {
            Some(client) => {
                client.disconnect().await;
                true
            }
            None => false,
        }
    }

    /// Disconnect every client.
    pub async fn disconnect_all(&mut self) {
        tracing::info!(count = self.clients.len(), "disconnecting all MCP servers");
        for client in self.clients.values_mut() {
            client.disconnect().await;
        }
    }

    /// Disconnect and drop a client. Returns false if no such client exists.
    pub async fn remove(&mut self, name: &str) -> bool {
        match self.clients.remove(name) {
            Some(mut client) => {
                client.disconnect().await;
                tracing::debug!(server = %name, "removed MCP server");
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for McpManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ready: Vec<&str> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_ready())
            .map(|(n, _)| n.as_str())
            .collect();
        f.debug_struct("McpManager")
            .field("servers", &self.names())
            .field("ready", &ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientOptions, LaunchSpec};

    fn client(name: &str, command: &str) -> McpClient {
        McpClient::new(name, LaunchSpec::new(command), ClientOptions::default())
    }

    #[test]
    fn test_new_manager_empty() {
        let manager = McpManager::new();
        assert!(manager.is_empty());
        assert_eq!(manager.ready_count(), 0);
    }

    #[test]
    fn test_add_and_names() {
        let mut manager = McpManager::new();
        assert!(manager.add(client("beta", "cmd")).is_none());
        assert!(manager.add(client("alpha", "cmd")).is_none());

        assert_eq!(manager.names(), vec!["alpha", "beta"]);
        assert!(manager.contains("alpha"));
        assert!(!manager.contains("gamma"));
    }

    #[test]
    fn test_add_replaces_same_name() {
        let mut manager = McpManager::new();
        manager.add(client("test", "first"));
        let previous = manager.add(client("test", "second")).unwrap();
        assert_eq!(previous.launch_spec().command, "first");
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get("test").unwrap().launch_spec().command, "second");
    }

    #[tokio::test]
    async fn test_connect_all_no_servers() {
        let mut manager = McpManager::new();
        assert_eq!(manager.connect_all().await, 0);
    }

    #[tokio::test]
    async fn test_connect_all_invalid_command() {
        let mut manager = McpManager::new();
        manager.add(client("invalid", "nonexistent-command-12345"));

        assert_eq!(manager.connect_all().await, 0);
        assert!(!manager.get("invalid").unwrap().is_ready());
        assert!(manager.list_all_tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_unknown() {
        let mut manager = McpManager::new();
        assert!(!manager.disconnect("nope").await);
        assert!(!manager.remove("nope").await);
    }

    #[tokio::test]
    async fn test_remove_registered() {
        let mut manager = McpManager::new();
        manager.add(client("test", "cmd"));
        assert!(manager.disconnect("test").await);
        assert!(manager.remove("test").await);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_debug_format() {
        let mut manager = McpManager::new();
        manager.add(client("test", "cmd"));
        let debug = format!("{:?}", manager);
        assert!(debug.contains("McpManager"));
        assert!(debug.contains("test"));
    }
}
