//! JSON-RPC 2.0 envelope types and the MCP messages built on them.
//!
//! On the stdio transport every envelope travels as one self-contained line
//! of UTF-8 JSON terminated by `\n`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{McpError, Result};

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names used by the client.
pub mod methods {
    /// Handshake request.
    pub const INITIALIZE: &str = "initialize";
    /// Handshake completion notification.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Tool discovery.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation.
    pub const TOOLS_CALL: &str = "tools/call";
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-RPC Base Types
// ─────────────────────────────────────────────────────────────────────────────

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID for correlating responses.
    pub id: u64,
    /// Method name to call.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Outcome carried by a response: exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// The `result` member (may be `null`).
    Result(Value),
    /// The `error` member.
    Error(JsonRpcError),
}

/// A JSON-RPC response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// Request ID this response is for. `None` when the server sent `null`.
    pub id: Option<u64>,
    /// Result or error.
    pub payload: ResponsePayload,
}

impl JsonRpcResponse {
    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }

    /// Get the result, or return the error object if this is an error response.
    pub fn into_result(self) -> std::result::Result<Value, JsonRpcError> {
        match self.payload {
            ResponsePayload::Result(value) => Ok(value),
            ResponsePayload::Error(error) => Err(error),
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes
impl JsonRpcError {
    /// Parse error - Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid Request - Not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

impl From<JsonRpcError> for McpError {
    fn from(e: JsonRpcError) -> Self {
        McpError::remote(e.code, e.message, e.data)
    }
}

/// Any envelope the server may write to its output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Response to one of our requests.
    Response(JsonRpcResponse),
    /// Server-initiated message (notification or request); the client does
    /// not serve these.
    ServerMessage {
        /// Method the server invoked.
        method: String,
        /// Id when the server expects an answer.
        id: Option<Value>,
    },
}

impl IncomingMessage {
    /// Parse one line read from the server.
    ///
    /// Returns [`McpError::MalformedResponse`] when the line is not a
    /// JSON-RPC 2.0 object, or when a response carries both or neither of
    /// `result` and `error`.
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| McpError::MalformedResponse(format!("invalid JSON: {e}")))?;
        let Value::Object(mut obj) = value else {
            return Err(McpError::MalformedResponse("envelope is not an object".into()));
        };

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            other => {
                return Err(McpError::MalformedResponse(format!(
                    "unexpected protocol marker: {other:?}"
                )));
            }
        }

        if let Some(method) = obj.get("method").and_then(Value::as_str) {
            return Ok(Self::ServerMessage {
                method: method.to_string(),
                id: obj.get("id").cloned(),
            });
        }

        let id = parse_id(&obj)?;
        let payload = match (obj.remove("result"), obj.remove("error")) {
            (Some(result), None) => ResponsePayload::Result(result),
            (None, Some(error)) => {
                let error: JsonRpcError = serde_json::from_value(error).map_err(|e| {
                    McpError::MalformedResponse(format!("invalid error object: {e}"))
                })?;
                ResponsePayload::Error(error)
            }
            (Some(_), Some(_)) => {
                return Err(McpError::MalformedResponse(
                    "response carries both result and error".into(),
                ));
            }
            (None, None) => {
                return Err(McpError::MalformedResponse(
                    "response carries neither result nor error".into(),
                ));
            }
        };

        Ok(Self::Response(JsonRpcResponse { id, payload }))
    }
}

fn parse_id(obj: &Map<String, Value>) -> Result<Option<u64>> {
    match obj.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| McpError::MalformedResponse(format!("unsupported id: {n}"))),
        Some(other) => Err(McpError::MalformedResponse(format!(
            "unsupported id: {other}"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MCP Protocol Types
// ─────────────────────────────────────────────────────────────────────────────

/// Roots capability advertised by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    /// Whether the client emits notifications when its roots change.
    pub list_changed: bool,
}

/// Client capabilities sent during initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Roots capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    /// Experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            roots: Some(RootsCapability { list_changed: true }),
            experimental: None,
        }
    }
}

/// Client identity sent during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl ClientInfo {
    /// Create a client identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new("toolwire", env!("CARGO_PKG_VERSION"))
    }
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version.
    pub protocol_version: String,
    /// Client capabilities.
    pub capabilities: ClientCapabilities,
    /// Client info.
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Build handshake parameters for the given identity.
    pub fn new(protocol_version: impl Into<String>, client_info: ClientInfo) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities: ClientCapabilities::default(),
            client_info,
        }
    }
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self::new(MCP_PROTOCOL_VERSION, ClientInfo::default())
    }
}

/// Server capabilities returned during initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tools capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    /// Resources capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
    /// Prompts capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Value>,
    /// Logging capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<Value>,
    /// Experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Tools capability details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// Whether the server supports listing tools that have changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server info returned during initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    #[serde(default)]
    pub version: String,
}

/// Result of the initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version.
    pub protocol_version: String,
    /// Server capabilities.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server info.
    pub server_info: ServerInfo,
}

/// A tool definition advertised by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(default)]
    pub input_schema: Value,
}

/// Result of the tools/list request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// List of available tools.
    pub tools: Vec<ToolInfo>,
}

/// Parameters for the tools/call request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments to pass to the tool.
    pub arguments: Map<String, Value>,
}

/// Content item in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Image content (base64 encoded).
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Resource reference.
    Resource {
        /// Resource URI.
        uri: String,
        /// Optional resource text.
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Optional MIME type.
        #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
        mime_type: Option<String>,
    },
}

/// The `result` of a successful tools/call, kept verbatim.
///
/// The client does not interpret the payload. Tools commonly return JSON
/// encoded as the `text` of the first content element, so callers decode
/// twice: once for the envelope, once for that text ([`ToolResult::decode`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolResult(Value);

impl ToolResult {
    /// Wrap a raw `result` value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw result.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the raw result.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// The `text` field of the first content element, if any.
    pub fn text(&self) -> Option<&str> {
        self.0
            .get("content")?
            .as_array()?
            .first()?
            .get("text")?
            .as_str()
    }

    /// Every text field in the content array, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.0
            .get("content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Typed view of the content array.
    pub fn contents(&self) -> Result<Vec<ToolContent>> {
        match self.0.get("content") {
            Some(content) => Ok(serde_json::from_value(content.clone())?),
            None => Ok(Vec::new()),
        }
    }

    /// Whether the tool flagged its own result as an error (`isError`).
    pub fn is_error(&self) -> bool {
        self.0
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Second decode of the payload.
    ///
    /// JSON text in the first content element is parsed; plain text becomes
    /// `{"text": ...}`; a result without text content is returned as is.
    pub fn decode(&self) -> Value {
        match self.text() {
            Some(text) => serde_json::from_str(text)
                .unwrap_or_else(|_| serde_json::json!({ "text": text })),
            None => self.0.clone(),
        }
    }
}
