//! MCP client owning one stdio server connection.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use tracing::Instrument;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, ClientInfo, IncomingMessage, InitializeParams, InitializeResult,
    JSONRPC_VERSION, JsonRpcError, JsonRpcNotification, JsonRpcRequest, ListToolsResult,
    MCP_PROTOCOL_VERSION, ToolInfo, ToolResult, methods,
};
use crate::transport::{ShutdownPolicy, StdioTransport, Termination};

/// What to spawn for an MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable to run.
    pub command: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Create a launch spec for `command` with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The command line as a single string, for logs and listings.
    pub fn display_command(&self) -> String {
        let mut cmd = self.command.clone();
        for arg in &self.args {
            cmd.push(' ');
            cmd.push_str(arg);
        }
        cmd
    }
}

/// Lifecycle of a client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No process attached.
    Disconnected,
    /// Process spawned, handshake in progress.
    Connecting,
    /// Handshake done; requests may be sent.
    Ready,
    /// Tearing the process down.
    ShuttingDown,
}

/// Timeouts, identity and logging for a client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Identity sent in `initialize`.
    pub client_info: ClientInfo,
    /// Protocol version sent in `initialize`.
    pub protocol_version: String,
    /// Bound on the handshake response.
    pub handshake_timeout: Duration,
    /// Bound on `tools/list` for an already provisioned server.
    pub list_timeout: Duration,
    /// Bound on `tools/list` when the server may still be provisioning.
    pub first_run_list_timeout: Duration,
    /// Use `first_run_list_timeout` for `tools/list`.
    pub first_run: bool,
    /// Default bound on `tools/call`.
    pub call_timeout: Duration,
    /// Wait after closing the server's input during disconnect.
    pub stdin_close_grace: Duration,
    /// Wait after the termination signal before killing.
    pub terminate_grace: Duration,
    /// Bound on the diagnostic stderr read.
    pub stderr_probe_timeout: Duration,
    /// Span all client activity is recorded under.
    pub span: Option<tracing::Span>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_info: ClientInfo::default(),
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            handshake_timeout: Duration::from_secs(10),
            list_timeout: Duration::from_secs(10),
            first_run_list_timeout: Duration::from_secs(100),
            first_run: false,
            call_timeout: Duration::from_secs(30),
            stdin_close_grace: Duration::from_millis(100),
            terminate_grace: Duration::from_secs(3),
            stderr_probe_timeout: Duration::from_secs(1),
            span: None,
        }
    }
}

impl ClientOptions {
    /// Set the client identity.
    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_info = ClientInfo::new(name, version);
        self
    }

    /// Set the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the interactive `tools/list` timeout.
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    /// Set the first-run `tools/list` timeout.
    pub fn with_first_run_list_timeout(mut self, timeout: Duration) -> Self {
        self.first_run_list_timeout = timeout;
        self
    }

    /// Mark the server as possibly provisioning itself on first use.
    pub fn with_first_run(mut self, first_run: bool) -> Self {
        self.first_run = first_run;
        self
    }

    /// Set the default `tools/call` timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the shutdown grace periods.
    pub fn with_shutdown_grace(mut self, stdin_close: Duration, terminate: Duration) -> Self {
        self.stdin_close_grace = stdin_close;
        self.terminate_grace = terminate;
        self
    }

    /// Set the diagnostic stderr read bound.
    pub fn with_stderr_probe_timeout(mut self, timeout: Duration) -> Self {
        self.stderr_probe_timeout = timeout;
        self
    }

    /// Record client activity under `span` instead of a fresh one.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// The `tools/list` bound in effect.
    pub fn effective_list_timeout(&self) -> Duration {
        if self.first_run {
            self.first_run_list_timeout
        } else {
            self.list_timeout
        }
    }

    fn shutdown_policy(&self) -> ShutdownPolicy {
        ShutdownPolicy {
            stdin_close_grace: self.stdin_close_grace,
            terminate_grace: self.terminate_grace,
        }
    }
}

/// Outcome of `tools/list`.
///
/// Listing never fails outright: on error `tools` is empty and the cause is
/// kept in `error`.
#[derive(Debug, Default)]
pub struct ToolListing {
    /// Tools the server advertised.
    pub tools: Vec<ToolInfo>,
    /// Why the listing is empty, if it failed.
    pub error: Option<McpError>,
}

impl ToolListing {
    /// Whether the listing succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, for callers that do want to fail.
    pub fn into_result(self) -> Result<Vec<ToolInfo>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.tools),
        }
    }
}

/// An MCP client connected to a single stdio server.
///
/// Methods take `&mut self`: one request is in flight at a time. Run several
/// clients to talk to several servers concurrently.
pub struct McpClient {
    /// Server name, used in logs.
    name: String,
    /// What to spawn.
    spec: LaunchSpec,
    /// Timeouts and identity.
    options: ClientOptions,
    /// Span all client activity is recorded under.
    span: tracing::Span,
    /// Current lifecycle state.
    state: ConnectionState,
    /// Live transport while connected.
    transport: Option<StdioTransport>,
    /// Server's handshake answer (after connecting).
    server_info: Option<InitializeResult>,
    /// Next request id; restarts at 1 for every connection.
    next_id: u64,
    /// How the most recent process ended.
    last_termination: Option<Termination>,
}

impl McpClient {
    /// Create a disconnected client.
    pub fn new(name: impl Into<String>, spec: LaunchSpec, options: ClientOptions) -> Self {
        let name = name.into();
        let span = options
            .span
            .clone()
            .unwrap_or_else(|| tracing::info_span!("mcp_client", server = %name));
        Self {
            name,
            spec,
            options,
            span,
            state: ConnectionState::Disconnected,
            transport: None,
            server_info: None,
            next_id: 1,
            last_termination: None,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the launch spec.
    pub fn launch_spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Get the client options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if requests may be sent.
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// The server's handshake answer, while connected.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Id of the most recent request on this connection (0 before any).
    pub fn last_request_id(&self) -> u64 {
        self.next_id - 1
    }

    /// How the most recent server process ended, once disconnected.
    pub fn last_termination(&self) -> Option<Termination> {
        self.last_termination
    }

    /// Process id of the running server.
    pub fn pid(&self) -> Option<u32> {
        self.transport.as_ref().and_then(StdioTransport::pid)
    }

    /// Spawn the server and perform the handshake with the configured timeout.
    pub async fn connect(&mut self) -> Result<&InitializeResult> {
        let timeout = self.options.handshake_timeout;
        self.connect_with_timeout(timeout).await
    }

    /// Spawn the server and perform the handshake.
    ///
    /// On any failure the process is torn down before returning, so a failed
    /// connect never leaves a child attached to the client.
    pub async fn connect_with_timeout(&mut self, timeout: Duration) -> Result<&InitializeResult> {
        if self.state == ConnectionState::Ready && self.server_info.is_some() {
            return self.server_info.as_ref().ok_or(McpError::NotConnected);
        }
        if self.transport.is_some() {
            self.disconnect().await;
        }

        let span = self.span.clone();
        tracing::info!(parent: &span, command = %self.spec.display_command(), "starting MCP server");

        match self.handshake(timeout).instrument(span.clone()).await {
            Ok(init) => {
                tracing::info!(
                    parent: &span,
                    server_name = %init.server_info.name,
                    version = %init.server_info.version,
                    protocol = %init.protocol_version,
                    "MCP server initialized"
                );
                self.state = ConnectionState::Ready;
                Ok(&*self.server_info.insert(init))
            }
            Err(e) => {
                tracing::error!(parent: &span, error = %e, "failed to connect to MCP server");
                self.disconnect().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, timeout: Duration) -> Result<InitializeResult> {
        let deadline = Instant::now() + timeout;
        self.state = ConnectionState::Connecting;
        self.next_id = 1;
        self.last_termination = None;
        self.transport = Some(StdioTransport::spawn(&self.spec)?);

        let params = InitializeParams::new(
            self.options.protocol_version.clone(),
            self.options.client_info.clone(),
        );
        let result = self
            .round_trip(methods::INITIALIZE, Some(serde_json::to_value(&params)?), timeout)
            .await;

        let value = match result {
            Ok(value) => value,
            Err(McpError::RequestTimeout { .. }) => return Err(McpError::HandshakeTimeout(timeout)),
            Err(McpError::RemoteError { code, message, .. }) => {
                return Err(McpError::handshake_rejected(format!(
                    "server error {code}: {message}"
                )));
            }
            Err(e) => return Err(e),
        };

        let init: InitializeResult = serde_json::from_value(value).map_err(|e| {
            McpError::handshake_rejected(format!("invalid initialize result: {e}"))
        })?;

        let initialized = JsonRpcNotification::new(methods::INITIALIZED, None);
        let transport = self.transport.as_mut().ok_or(McpError::NotConnected)?;
        if !send_by(transport, &initialized, deadline).await? {
            return Err(McpError::HandshakeTimeout(timeout));
        }
        Ok(init)
    }

    /// List available tools with the configured timeout.
    pub async fn list_tools(&mut self) -> ToolListing {
        let timeout = self.options.effective_list_timeout();
        self.list_tools_with_timeout(timeout).await
    }

    /// List available tools.
    ///
    /// Every call is a fresh round trip; nothing is cached.
    pub async fn list_tools_with_timeout(&mut self, timeout: Duration) -> ToolListing {
        let outcome = self
            .request(methods::TOOLS_LIST, None, timeout)
            .await
            .and_then(|value| Ok(serde_json::from_value::<ListToolsResult>(value)?));

        match outcome {
            Ok(list) => {
                tracing::debug!(
                    parent: &self.span,
                    tool_count = list.tools.len(),
                    "listed MCP tools"
                );
                ToolListing {
                    tools: list.tools,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(parent: &self.span, error = %e, "failed to list tools");
                ToolListing {
                    tools: Vec::new(),
                    error: Some(e),
                }
            }
        }
    }

    /// Call a tool with the configured timeout.
    pub async fn call_tool_default(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult> {
        let timeout = self.options.call_timeout;
        self.call_tool(name, arguments, timeout).await
    }

    /// Call a tool on the server.
    ///
    /// The `result` is returned verbatim; see [`ToolResult::decode`] for the
    /// payload's second decode.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<ToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let params = serde_json::to_value(&params)?;

        match self.request(methods::TOOLS_CALL, Some(params), timeout).await {
            Ok(value) => {
                let result = ToolResult::new(value);
                if result.is_error() {
                    tracing::warn!(parent: &self.span, tool = %name, "tool call returned error");
                } else {
                    tracing::debug!(parent: &self.span, tool = %name, "tool call succeeded");
                }
                Ok(result)
            }
            Err(e) => {
                tracing::error!(parent: &self.span, tool = %name, error = %e, "failed to call tool");
                Err(e)
            }
        }
    }

    /// Send a request and wait for its response.
    ///
    /// Fails fast with [`McpError::NotConnected`] unless the client is ready.
    /// A server that goes away mid-call, or one that stops reading so the
    /// request cannot be written in time, moves the client to disconnected.
    pub async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        if !self.is_ready() {
            return Err(McpError::NotConnected);
        }

        let result = self.round_trip(method, params, timeout).await;
        if let Err(e) = &result {
            self.drop_if_unusable(e).await;
        }
        result
    }

    /// Send a notification (no response expected).
    ///
    /// The write is bounded by the call timeout.
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.is_ready() {
            return Err(McpError::NotConnected);
        }

        let timeout = self.options.call_timeout;
        let notification = JsonRpcNotification::new(method, params);
        let transport = self.transport.as_mut().ok_or(McpError::NotConnected)?;
        let result = match send_by(transport, &notification, Instant::now() + timeout).await {
            Ok(true) => return Ok(()),
            Ok(false) => Err(McpError::request_timeout(method, timeout)),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.drop_if_unusable(e).await;
        }
        result
    }

    /// Disconnect when `error` left the pipes unusable.
    async fn drop_if_unusable(&mut self, error: &McpError) {
        let lost = matches!(error, McpError::PeerExited(_) | McpError::Io(_));
        let stalled = self.transport.as_ref().is_some_and(|t| !t.input_open());
        if lost || stalled {
            tracing::warn!(parent: &self.span, error = %error, "connection unusable, disconnecting");
            self.disconnect().await;
        }
    }

    async fn round_trip(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(id, method, params);
        let probe = self.options.stderr_probe_timeout;
        let transport = self.transport.as_mut().ok_or(McpError::NotConnected)?;

        exchange(transport, &request, timeout, probe)
            .instrument(self.span.clone())
            .await
    }

    /// Tear down the connection.
    ///
    /// Idempotent and infallible: closes the server's input, signals it, kills
    /// it if needed and waits until it is reaped. Calling it while already
    /// disconnected does nothing.
    pub async fn disconnect(&mut self) {
        let Some(transport) = self.transport.take() else {
            self.state = ConnectionState::Disconnected;
            return;
        };

        self.state = ConnectionState::ShuttingDown;
        let ending = transport
            .shutdown(self.options.shutdown_policy())
            .instrument(self.span.clone())
            .await;

        self.last_termination = Some(ending);
        self.server_info = None;
        self.state = ConnectionState::Disconnected;
        tracing::info!(parent: &self.span, termination = ?ending, "disconnected from MCP server");
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        let span = self.span.clone();
        if let Some(transport) = self.transport.as_mut() {
            tracing::warn!(parent: &span, "client dropped while connected; killing MCP server");
            transport.start_kill();
        }
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("command", &self.spec.display_command())
            .field("state", &self.state)
            .field("pid", &self.pid())
            .finish()
    }
}

/// Connect, hand the client to `f`, then always disconnect.
///
/// The server is torn down before this returns whether `f` succeeds or not;
/// if `f` panics, the client's `Drop` still kills the process.
pub async fn with_client<T, F>(
    name: impl Into<String>,
    spec: LaunchSpec,
    options: ClientOptions,
    f: F,
) -> Result<T>
where
    F: AsyncFnOnce(&mut McpClient) -> T,
{
    let mut client = McpClient::new(name, spec, options);
    client.connect().await?;
    let output = f(&mut client).await;
    client.disconnect().await;
    Ok(output)
}

/// Write `request` and read lines until its response, a timeout, or EOF.
///
/// The deadline covers the write as well as the wait. Blank lines are
/// skipped. Responses for other ids (late answers to requests that already
/// timed out) are discarded. A malformed line ends the attempt and is
/// reported as a timeout.
async fn exchange(
    transport: &mut StdioTransport,
    request: &JsonRpcRequest,
    timeout: Duration,
    probe: Duration,
) -> Result<Value> {
    let method = request.method.as_str();
    let id = request.id;
    let deadline = Instant::now() + timeout;

    if !send_by(transport, request, deadline).await? {
        tracing::warn!(
            method,
            id,
            timeout_ms = timeout.as_millis() as u64,
            "request write timed out"
        );
        return Err(McpError::request_timeout(method, timeout));
    }

    loop {
        let line = match tokio::time::timeout_at(deadline, transport.read_line()).await {
            Err(_) => {
                tracing::warn!(
                    method,
                    id,
                    timeout_ms = timeout.as_millis() as u64,
                    "response timed out"
                );
                log_stderr(transport, probe).await;
                return Err(McpError::request_timeout(method, timeout));
            }
            Ok(Err(McpError::MalformedResponse(reason))) => {
                tracing::error!(method, id, %reason, "failed to parse response");
                log_stderr(transport, probe).await;
                return Err(McpError::request_timeout(method, timeout));
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(None)) => {
                log_stderr(transport, probe).await;
                let code = transport.exit_code();
                tracing::error!(method, id, code, "server closed its output");
                return Err(McpError::PeerExited(code));
            }
            Ok(Ok(Some(line))) => line,
        };

        if line.trim().is_empty() {
            continue;
        }

        match IncomingMessage::parse(&line) {
            Ok(IncomingMessage::Response(response))
                if response.id == Some(id) || (response.id.is_none() && response.is_error()) =>
            {
                return response.into_result().map_err(McpError::from);
            }
            Ok(IncomingMessage::Response(response)) => {
                tracing::debug!(expected = id, got = ?response.id, "discarding stale response");
            }
            Ok(IncomingMessage::ServerMessage {
                method: server_method,
                id: Some(server_id),
            }) if !server_id.is_null() => {
                let reply = server_reply(&server_method, server_id);
                if !send_by(transport, &reply, deadline).await? {
                    return Err(McpError::request_timeout(method, timeout));
                }
            }
            Ok(IncomingMessage::ServerMessage { method: server_method, .. }) => {
                tracing::debug!(method = %server_method, "ignoring server notification");
            }
            Err(e) => {
                tracing::error!(method, id, error = %e, "failed to parse response");
                log_stderr(transport, probe).await;
                return Err(McpError::request_timeout(method, timeout));
            }
        }
    }
}

/// Write `message` unless `deadline` passes first.
///
/// Returns `Ok(false)` when the deadline won. The pipe may then hold half a
/// line, so the transport's input is abandoned.
async fn send_by<T: Serialize>(
    transport: &mut StdioTransport,
    message: &T,
    deadline: Instant,
) -> Result<bool> {
    match tokio::time::timeout_at(deadline, transport.send(message)).await {
        Ok(sent) => sent.map(|()| true),
        Err(_) => {
            transport.abandon_input();
            Ok(false)
        }
    }
}

/// Reply to a request the server sent us while we wait for our own answer.
fn server_reply(method: &str, id: Value) -> Value {
    tracing::debug!(method, ?id, "answering server request");
    match method {
        "ping" => json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": {} }),
        "roots/list" => json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": { "roots": [] } }),
        _ => json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "error": {
                "code": JsonRpcError::METHOD_NOT_FOUND,
                "message": format!("method not supported by client: {method}"),
            }
        }),
    }
}

async fn log_stderr(transport: &mut StdioTransport, probe: Duration) {
    if let Some(line) = transport.probe_stderr(probe).await {
        tracing::error!(stderr = %line, "server stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_spec_builder() {
        let spec = LaunchSpec::new("uvx")
            .with_arg("mcp-server-git")
            .with_arg("--repository")
            .with_arg("/tmp/repo")
            .with_env("FASTMCP_LOG_LEVEL", "ERROR");

        assert_eq!(spec.command, "uvx");
        assert_eq!(spec.args, vec!["mcp-server-git", "--repository", "/tmp/repo"]);
        assert_eq!(spec.env.get("FASTMCP_LOG_LEVEL").map(String::as_str), Some("ERROR"));
        assert_eq!(
            spec.display_command(),
            "uvx mcp-server-git --repository /tmp/repo"
        );
    }

    #[test]
    fn test_with_args_replaces() {
        let spec = LaunchSpec::new("server").with_arg("old").with_args(["a", "b"]);
        assert_eq!(spec.args, vec!["a", "b"]);
    }

    #[test]
    fn test_options_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.handshake_timeout, Duration::from_secs(10));
        assert_eq!(options.call_timeout, Duration::from_secs(30));
        assert_eq!(options.terminate_grace, Duration::from_secs(3));
        assert_eq!(options.protocol_version, MCP_PROTOCOL_VERSION);
        assert_eq!(options.client_info.name, "toolwire");
    }

    #[test]
    fn test_effective_list_timeout() {
        let options = ClientOptions::default()
            .with_list_timeout(Duration::from_secs(5))
            .with_first_run_list_timeout(Duration::from_secs(120));
        assert_eq!(options.effective_list_timeout(), Duration::from_secs(5));

        let options = options.with_first_run(true);
        assert_eq!(options.effective_list_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_new_client_is_disconnected() {
        let client = McpClient::new("test", LaunchSpec::new("cat"), ClientOptions::default());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_ready());
        assert!(client.server_info().is_none());
        assert_eq!(client.last_request_id(), 0);
        assert!(client.pid().is_none());
    }

    #[tokio::test]
    async fn test_calls_before_connect_fail_fast() {
        let mut client = McpClient::new("test", LaunchSpec::new("cat"), ClientOptions::default());

        let err = client
            .call_tool("echo", Map::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::NotConnected));

        let listing = client.list_tools().await;
        assert!(listing.tools.is_empty());
        assert!(matches!(listing.error, Some(McpError::NotConnected)));

        assert!(matches!(
            client.notify("x", None).await,
            Err(McpError::NotConnected)
        ));
        // Nothing was sent, so no id was consumed.
        assert_eq!(client.last_request_id(), 0);
    }

    #[tokio::test]
    async fn test_connect_nonexistent_server() {
        let mut client = McpClient::new(
            "test",
            LaunchSpec::new("nonexistent-mcp-server-12345"),
            ClientOptions::default(),
        );
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, McpError::SpawnFailed(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_when_never_connected_is_noop() {
        let mut client = McpClient::new("test", LaunchSpec::new("cat"), ClientOptions::default());
        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.last_termination().is_none());
    }

    #[test]
    fn test_tool_listing_into_result() {
        let ok = ToolListing::default();
        assert!(ok.is_ok());
        assert!(ok.into_result().unwrap().is_empty());

        let failed = ToolListing {
            tools: Vec::new(),
            error: Some(McpError::NotConnected),
        };
        assert!(!failed.is_ok());
        assert!(matches!(failed.into_result(), Err(McpError::NotConnected)));
    }

    #[test]
    fn test_server_reply() {
        let pong = server_reply("ping", json!("srv-1"));
        assert_eq!(pong["id"], "srv-1");
        assert_eq!(pong["result"], json!({}));

        let roots = server_reply("roots/list", json!(7));
        assert_eq!(roots["result"]["roots"], json!([]));

        let unknown = server_reply("sampling/createMessage", json!(8));
        assert_eq!(unknown["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
        assert!(unknown.get("result").is_none());
    }
}
