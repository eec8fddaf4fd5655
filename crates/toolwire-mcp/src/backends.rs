//! Typed wrappers over the tool catalogs of known MCP servers.
//!
//! Each facade borrows a connected [`McpClient`] and maps a method onto a
//! fixed tool name and argument shape. The transport knows nothing about
//! these tools.

use serde_json::{Map, Value};

use crate::client::{ClientOptions, LaunchSpec, McpClient};
use crate::error::Result;
use crate::protocol::{ClientInfo, ToolResult};

/// Known backends with a launch recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `mcp-server-git`, launched through `uvx`.
    Git,
    /// AWS documentation server, launched through `uvx`.
    AwsDocs,
}

impl Backend {
    /// All known backends.
    pub const ALL: [Backend; 2] = [Backend::Git, Backend::AwsDocs];

    /// Server name used in configuration and logs.
    pub fn server_name(self) -> &'static str {
        match self {
            Backend::Git => "git",
            Backend::AwsDocs => "aws-docs",
        }
    }

    /// Look a backend up by its server name.
    pub fn from_server_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.server_name() == name)
    }

    /// How to start the server.
    pub fn launch_spec(self) -> LaunchSpec {
        match self {
            Backend::Git => LaunchSpec::new("uvx").with_arg("mcp-server-git"),
            Backend::AwsDocs => LaunchSpec::new("uvx")
                .with_arg("awslabs.aws-documentation-mcp-server@latest")
                .with_env("FASTMCP_LOG_LEVEL", "ERROR"),
        }
    }

    /// Identity presented in the handshake.
    pub fn client_info(self) -> ClientInfo {
        let name = match self {
            Backend::Git => "git-mcp-client",
            Backend::AwsDocs => "aws-docs-client",
        };
        ClientInfo::new(name, env!("CARGO_PKG_VERSION"))
    }

    /// Whether the server may install itself on first launch.
    ///
    /// `@latest` makes `uvx` resolve and fetch the package before the server
    /// answers anything, so listing gets the long timeout.
    pub fn provisions_on_first_run(self) -> bool {
        matches!(self, Backend::AwsDocs)
    }

    /// Default options for this backend.
    pub fn options(self) -> ClientOptions {
        let info = self.client_info();
        ClientOptions::default()
            .with_client_info(info.name, info.version)
            .with_first_run(self.provisions_on_first_run())
    }

    /// A disconnected client for this backend.
    pub fn client(self) -> McpClient {
        McpClient::new(self.server_name(), self.launch_spec(), self.options())
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.server_name())
    }
}

fn with_repo(mut args: Map<String, Value>, repo_path: Option<&str>) -> Map<String, Value> {
    if let Some(path) = repo_path {
        args.insert("repo_path".to_string(), Value::from(path));
    }
    args
}

// ─────────────────────────────────────────────────────────────────────────────
// Git
// ─────────────────────────────────────────────────────────────────────────────

/// Git operations over `mcp-server-git`.
#[derive(Debug)]
pub struct GitTools<'a> {
    client: &'a mut McpClient,
}

impl<'a> GitTools<'a> {
    /// Default number of log entries.
    pub const DEFAULT_LOG_COUNT: u32 = 10;

    /// Wrap a connected client.
    pub fn new(client: &'a mut McpClient) -> Self {
        Self { client }
    }

    /// Working tree status.
    pub async fn status(&mut self, repo_path: Option<&str>) -> Result<ToolResult> {
        self.call("git_status", with_repo(Map::new(), repo_path)).await
    }

    /// Recent commits, newest first.
    pub async fn log(&mut self, repo_path: Option<&str>, max_count: Option<u32>) -> Result<ToolResult> {
        let mut args = Map::new();
        args.insert(
            "max_count".to_string(),
            Value::from(max_count.unwrap_or(Self::DEFAULT_LOG_COUNT)),
        );
        self.call("git_log", with_repo(args, repo_path)).await
    }

    /// Diff of the working tree, or of the index when `cached`.
    pub async fn diff(&mut self, repo_path: Option<&str>, cached: bool) -> Result<ToolResult> {
        let mut args = Map::new();
        args.insert("cached".to_string(), Value::Bool(cached));
        self.call("git_diff", with_repo(args, repo_path)).await
    }

    /// Commit staged changes.
    pub async fn commit(&mut self, message: &str, repo_path: Option<&str>) -> Result<ToolResult> {
        let mut args = Map::new();
        args.insert("message".to_string(), Value::from(message));
        self.call("git_commit", with_repo(args, repo_path)).await
    }

    /// Stage files.
    pub async fn add<S: AsRef<str>>(&mut self, files: &[S], repo_path: Option<&str>) -> Result<ToolResult> {
        let files: Vec<Value> = files.iter().map(|f| Value::from(f.as_ref())).collect();
        let mut args = Map::new();
        args.insert("files".to_string(), Value::Array(files));
        self.call("git_add", with_repo(args, repo_path)).await
    }

    async fn call(&mut self, tool: &str, args: Map<String, Value>) -> Result<ToolResult> {
        self.client.call_tool_default(tool, args).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AWS documentation
// ─────────────────────────────────────────────────────────────────────────────

/// Documentation lookups over the AWS documentation server.
#[derive(Debug)]
pub struct AwsDocsTools<'a> {
    client: &'a mut McpClient,
}

impl<'a> AwsDocsTools<'a> {
    /// Wrap a connected client.
    pub fn new(client: &'a mut McpClient) -> Self {
        Self { client }
    }

    /// Search the documentation. `extra` is merged into the arguments
    /// (e.g. `limit`). Returns the decoded payload.
    pub async fn search_documentation(
        &mut self,
        search_phrase: &str,
        extra: Map<String, Value>,
    ) -> Result<Value> {
        let mut args = extra;
        args.insert("search_phrase".to_string(), Value::from(search_phrase));
        let result = self.client.call_tool_default("search_documentation", args).await?;
        Ok(result.decode())
    }

    /// Fetch a page as markdown. `extra` carries paging options such as
    /// `max_length` and `start_index`.
    pub async fn read_documentation(&mut self, url: &str, extra: Map<String, Value>) -> Result<String> {
        let mut args = extra;
        args.insert("url".to_string(), Value::from(url));
        let result = self.client.call_tool_default("read_documentation", args).await?;
        Ok(result.texts().join("\n"))
    }

    /// Pages related to `url`. Returns the decoded payload.
    pub async fn recommend(&mut self, url: &str) -> Result<Value> {
        let mut args = Map::new();
        args.insert("url".to_string(), Value::from(url));
        let result = self.client.call_tool_default("recommend", args).await?;
        Ok(result.decode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names_round_trip() {
        for backend in Backend::ALL {
            assert_eq!(Backend::from_server_name(backend.server_name()), Some(backend));
        }
        assert_eq!(Backend::from_server_name("svn"), None);
        assert_eq!(Backend::AwsDocs.to_string(), "aws-docs");
    }

    #[test]
    fn test_git_launch_spec() {
        let spec = Backend::Git.launch_spec();
        assert_eq!(spec.display_command(), "uvx mcp-server-git");
        assert!(spec.env.is_empty());
        assert!(!Backend::Git.options().first_run);
    }

    #[test]
    fn test_aws_docs_launch_spec() {
        let spec = Backend::AwsDocs.launch_spec();
        assert_eq!(spec.args, vec!["awslabs.aws-documentation-mcp-server@latest"]);
        assert_eq!(spec.env.get("FASTMCP_LOG_LEVEL").map(String::as_str), Some("ERROR"));

        let options = Backend::AwsDocs.options();
        assert!(options.first_run);
        assert_eq!(options.client_info.name, "aws-docs-client");
    }

    #[test]
    fn test_repo_path_only_sent_when_given() {
        assert!(with_repo(Map::new(), None).is_empty());
        let args = with_repo(Map::new(), Some("/tmp/repo"));
        assert_eq!(args.get("repo_path"), Some(&Value::from("/tmp/repo")));
    }

    #[test]
    fn test_backend_client_is_named() {
        let client = Backend::Git.client();
        assert_eq!(client.name(), "git");
        assert!(!client.is_ready());
    }
}
