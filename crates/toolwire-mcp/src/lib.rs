//! Stdio MCP (Model Context Protocol) client.
//!
//! This crate spawns an MCP tool server as a child process and speaks
//! JSON-RPC 2.0 to it over the child's standard input and output.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpClient                                                  │
//! │  - Disconnected → Connecting → Ready → ShuttingDown         │
//! │  - initialize handshake, tools/list, tools/call             │
//! │  - Request ids, response correlation, per-call timeouts     │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StdioTransport                                             │
//! │  - Child process in its own process group                   │
//! │  - One JSON object per line, both directions                │
//! │  - Close stdin → SIGTERM → SIGKILL, always reaped           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use serde_json::Map;
//! use toolwire_mcp::{ClientOptions, LaunchSpec, McpClient};
//!
//! let spec = LaunchSpec::new("uvx").with_arg("mcp-server-git");
//! let mut client = McpClient::new("git", spec, ClientOptions::default());
//!
//! let info = client.connect().await?;
//! println!("Connected to: {} v{}", info.server_info.name, info.server_info.version);
//!
//! for tool in client.list_tools().await.tools {
//!     println!("Tool: {} - {}", tool.name, tool.description);
//! }
//!
//! let result = client.call_tool_default("git_status", Map::new()).await?;
//! println!("{}", result.decode());
//!
//! client.disconnect().await;
//! ```
//!
//! # Wire format
//!
//! Every message is a single line of JSON terminated by `\n`:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"initialize","params":{...}}
//! ```
//!
//! The protocol flow is:
//! 1. Client sends `initialize` with its identity and capabilities
//! 2. Server responds with its info and capabilities
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` and `tools/call`

pub mod backends;
pub mod client;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod transport;

pub use backends::{AwsDocsTools, Backend, GitTools};
pub use client::{ClientOptions, ConnectionState, LaunchSpec, McpClient, ToolListing, with_client};
pub use error::{McpError, Result};
pub use manager::McpManager;
pub use protocol::{
    CallToolParams, ClientInfo, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerCapabilities,
    ServerInfo, ToolContent, ToolInfo, ToolResult, ToolsCapability,
};
pub use transport::{ShutdownPolicy, Termination};
