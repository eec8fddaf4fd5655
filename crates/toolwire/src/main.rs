//! toolwire - command-line client for stdio MCP tool servers.
//!
//! Main entry point for the toolwire CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::Style;

mod commands;

use commands::{call, docs, git, servers, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// toolwire - talk to MCP tool servers over stdio
#[derive(Parser)]
#[command(name = "toolwire")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config directory (default: platform config dir)
    #[arg(long, global = true, env = "TOOLWIRE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List and edit configured MCP servers
    Servers(servers::ServersArgs),

    /// List the tools a server offers
    Tools(tools::ToolsArgs),

    /// Call a tool with raw JSON arguments
    Call(call::CallArgs),

    /// Git operations through the git server
    Git(git::GitArgs),

    /// AWS documentation lookups through the docs server
    Docs(docs::DocsArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_dir = cli.config_dir.clone().or_else(toolwire_config::default_config_dir);
    let _guard = init_tracing(cli.verbose, config_dir.as_ref().map(|d| d.join("logs")));

    match run(cli, config_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let red = Style::new().red().bold();
            eprintln!("{} {:#}", red.apply_to("error:"), e);
            if e.is::<commands::Interrupted>() {
                ExitCode::from(130)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli, config_dir: Option<PathBuf>) -> Result<()> {
    let ctx = commands::Context::load(config_dir.as_deref(), cli.json, cli.verbose)?;

    match cli.command {
        Commands::Servers(args) => servers::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Call(args) => call::run(args, &ctx).await,
        Commands::Git(args) => git::run(args, &ctx).await,
        Commands::Docs(args) => docs::run(args, &ctx).await,
    }
}

/// Console (human-readable, stderr) + daily rolling JSON file.
///
/// The file layer is skipped when the log directory cannot be created.
fn init_tracing(
    verbose: bool,
    log_dir: Option<PathBuf>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let console_filter = if verbose {
        "toolwire=debug,toolwire_mcp=debug,toolwire_config=debug,info"
    } else {
        // `toolwire` also prefixes the library targets.
        "toolwire=warn,toolwire_mcp=off,toolwire_config=off,off"
    };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_filter));

    let appender = log_dir.and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("toolwire")
            .filename_suffix("log")
            .build(dir)
            .ok()
    });
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(
                    "toolwire=trace,toolwire_mcp=trace,toolwire_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}
