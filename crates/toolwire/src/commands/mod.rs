//! CLI command handlers.

pub mod call;
pub mod docs;
pub mod git;
pub mod servers;
pub mod tools;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde_json::Value;
use toolwire_config::{ConfigFiles, ServerEntry, ToolwireConfig};
use toolwire_mcp::{ClientOptions, LaunchSpec, McpClient, McpManager};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: ToolwireConfig,
    /// User config file, where `servers add/remove` write.
    pub user_config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// The command was cut short by Ctrl-C.
#[derive(Debug)]
pub struct Interrupted;

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("interrupted")
    }
}

impl std::error::Error for Interrupted {}

impl Context {
    /// Load configuration layers and build the context.
    pub fn load(config_dir: Option<&Path>, json_output: bool, verbose: bool) -> Result<Self> {
        let loaded = ConfigFiles::locate(config_dir, None).load();
        for problem in loaded.problems() {
            tracing::warn!("{problem}");
        }
        tracing::debug!(sources = ?loaded.applied(), "configuration loaded");

        Ok(Self {
            user_config_path: loaded.user_file().map(Path::to_path_buf),
            config: loaded.config,
            json_output,
            verbose,
        })
    }

    /// Build a disconnected client for a configured or built-in server.
    pub fn client(&self, server: &str, first_run: bool) -> Result<McpClient> {
        let entry = self.config.resolve_server(server)?;
        let options = self.client_options(&entry, first_run);
        Ok(McpClient::new(&entry.name, launch_spec(&entry), options))
    }

    fn client_options(&self, entry: &ServerEntry, first_run: bool) -> ClientOptions {
        let timeouts = &self.config.timeouts;
        let mut options = ClientOptions::default()
            .with_handshake_timeout(timeouts.handshake())
            .with_list_timeout(timeouts.list())
            .with_first_run_list_timeout(timeouts.first_run_list())
            .with_first_run(entry.first_run || first_run)
            .with_call_timeout(timeouts.call())
            .with_shutdown_grace(timeouts.stdin_close_grace(), timeouts.terminate_grace())
            .with_stderr_probe_timeout(timeouts.stderr_probe())
            .with_span(tracing::info_span!("mcp_client", server = %entry.name));
        if let Some(name) = &entry.client_name {
            options = options.with_client_info(name, env!("CARGO_PKG_VERSION"));
        }
        options
    }
}

fn launch_spec(entry: &ServerEntry) -> LaunchSpec {
    entry
        .env
        .iter()
        .fold(
            LaunchSpec::new(&entry.command).with_args(entry.args.iter().cloned()),
            |spec, (key, value)| spec.with_env(key, value),
        )
}

/// Connect to `server`, run `f` on the client, and always disconnect.
///
/// Ctrl-C aborts `f`; the server is still torn down before returning.
pub async fn with_server<T, F>(ctx: &Context, server: &str, first_run: bool, f: F) -> Result<T>
where
    F: AsyncFnOnce(&mut McpClient) -> Result<T>,
{
    let mut manager = McpManager::new();
    manager.add(ctx.client(server, first_run)?);

    let outcome = tokio::select! {
        outcome = drive(&mut manager, server, f) => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(server = %server, "interrupted, shutting down server");
            Err(Interrupted.into())
        }
    };

    manager.disconnect_all().await;
    outcome
}

async fn drive<T, F>(manager: &mut McpManager, server: &str, f: F) -> Result<T>
where
    F: AsyncFnOnce(&mut McpClient) -> Result<T>,
{
    let client = manager
        .get_mut(server)
        .with_context(|| format!("server '{server}' not registered"))?;
    if let Err(e) = client.connect().await {
        anyhow::bail!("failed to connect to '{server}': {e}");
    }
    f(client).await
}

/// Print a tool payload: bare text when it is just text, JSON otherwise.
pub fn print_payload(value: &Value, ctx: &Context) -> Result<()> {
    match value {
        Value::String(s) if !ctx.json_output => println!("{s}"),
        Value::Object(obj) if !ctx.json_output && obj.len() == 1 && obj.contains_key("text") => {
            if let Some(text) = obj.get("text").and_then(Value::as_str) {
                println!("{text}");
            }
        }
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}

/// Truncate to `max` characters, marking the cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}
