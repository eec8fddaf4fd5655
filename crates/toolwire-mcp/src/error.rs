//! Error types for MCP operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to spawn the MCP server process.
    #[error("failed to spawn MCP server: {0}")]
    SpawnFailed(String),

    /// The server did not answer `initialize` in time.
    #[error("handshake timed out after {}ms", .0.as_millis())]
    HandshakeTimeout(Duration),

    /// The server answered `initialize` with an error or an unusable result.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Operation attempted while the client is not ready.
    #[error("not connected to MCP server")]
    NotConnected,

    /// No matching response arrived within the call's timeout.
    #[error("timeout waiting for response to '{method}' after {}ms", .timeout.as_millis())]
    RequestTimeout {
        /// Method of the request that timed out.
        method: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The server process closed its output or exited mid-call.
    #[error("MCP server exited{}", .0.map(|c| format!(" with code {c}")).unwrap_or_default())]
    PeerExited(Option<i32>),

    /// A line on the server's output was not a JSON-RPC envelope.
    ///
    /// Recovered inside the client: it surfaces to callers as
    /// [`McpError::RequestTimeout`].
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Server returned a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    RemoteError {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Create a spawn failed error.
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    /// Create a handshake rejected error.
    pub fn handshake_rejected(msg: impl Into<String>) -> Self {
        Self::HandshakeRejected(msg.into())
    }

    /// Create a request timeout error.
    pub fn request_timeout(method: impl Into<String>, timeout: Duration) -> Self {
        Self::RequestTimeout {
            method: method.into(),
            timeout,
        }
    }

    /// Create a remote error from an error response.
    pub fn remote(code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::RemoteError {
            code,
            message: message.into(),
            data,
        }
    }

    /// Whether the connection is still usable after this error.
    ///
    /// Timeouts and server-side errors leave the process attached; a caller
    /// may retry or disconnect. Everything else means the connection is gone
    /// or never existed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::RemoteError { .. } | Self::MalformedResponse(_)
        )
    }

    /// Whether this error ended (or prevented) the connection.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed(_)
                | Self::HandshakeTimeout(_)
                | Self::HandshakeRejected(_)
                | Self::PeerExited(_)
                | Self::NotConnected
        )
    }
}
