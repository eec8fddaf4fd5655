//! Server configuration commands.
//!
//! - `toolwire servers` - List configured and built-in servers
//! - `toolwire servers add` - Add a server to the user config
//! - `toolwire servers remove` - Remove a server from the user config

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::Style;
use serde_json::json;

use toolwire_config::{ServerEntry, edit_user_layer};

use super::{Context, truncate};

/// Server configuration commands.
#[derive(Args, Debug)]
pub struct ServersArgs {
    #[command(subcommand)]
    pub command: Option<ServersCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ServersCommand {
    /// List configured servers (default)
    List,

    /// Add or replace a server in the user config
    Add(AddArgs),

    /// Remove a server from the user config
    Remove(RemoveArgs),
}

/// Arguments for `toolwire servers add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Unique name for this server
    pub name: String,

    /// Command to spawn
    pub command: String,

    /// Arguments to pass to the command
    #[arg(last = true)]
    pub args: Vec<String>,

    /// Environment variables in KEY=VALUE format
    #[arg(long = "env", short = 'e')]
    pub env_vars: Vec<String>,

    /// Client name presented in the handshake
    #[arg(long)]
    pub client_name: Option<String>,

    /// Server installs itself on first launch (longer tool listing timeout)
    #[arg(long)]
    pub first_run: bool,

    /// Add the server disabled
    #[arg(long)]
    pub disabled: bool,
}

/// Arguments for `toolwire servers remove`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Name of the server to remove
    pub name: String,
}

/// Run the servers command.
pub async fn run(args: ServersArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ServersCommand::List) {
        ServersCommand::List => run_list(ctx),
        ServersCommand::Add(add_args) => run_add(add_args, ctx),
        ServersCommand::Remove(remove_args) => run_remove(remove_args, ctx),
    }
}

fn run_list(ctx: &Context) -> Result<()> {
    let servers = ctx.config.all_servers();

    if ctx.json_output {
        let output: Vec<_> = servers
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "command": s.command,
                    "args": s.args,
                    "env": s.env,
                    "enabled": s.enabled,
                    "first_run": s.first_run,
                    "builtin": s.is_builtin(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();
    println!(
        "{}",
        bold.apply_to(format!("{:<16} {:<10} {:<9} {}", "NAME", "STATUS", "SOURCE", "COMMAND"))
    );
    println!("{}", "-".repeat(80));

    for server in &servers {
        let status = if server.enabled { "enabled" } else { "disabled" };
        let source = if server.is_builtin() { "builtin" } else { "config" };
        println!(
            "{:<16} {:<10} {:<9} {}",
            truncate(&server.name, 16),
            status,
            source,
            truncate(&server.display_command(), 42)
        );

        if ctx.verbose {
            for (key, value) in &server.env {
                println!("  {} {}={}", dim.apply_to("env"), key, value);
            }
            if let Some(name) = &server.client_name {
                println!("  {} {}", dim.apply_to("client"), name);
            }
            if server.first_run {
                println!("  {}", dim.apply_to("provisions on first run"));
            }
        }
    }

    Ok(())
}

fn user_file(ctx: &Context) -> Result<&std::path::Path> {
    ctx.user_config_path
        .as_deref()
        .context("no config directory available; pass --config-dir")
}

fn run_add(args: AddArgs, ctx: &Context) -> Result<()> {
    let mut entry = ServerEntry::new(&args.name, &args.command)
        .with_args(args.args)
        .with_first_run(args.first_run)
        .with_enabled(!args.disabled);
    for var in &args.env_vars {
        let (key, value) = var
            .split_once('=')
            .with_context(|| format!("invalid environment variable '{var}', use KEY=VALUE"))?;
        entry = entry.with_env(key, value);
    }
    if let Some(name) = args.client_name {
        entry = entry.with_client_name(name);
    }
    entry.validate()?;

    let path = user_file(ctx)?;
    edit_user_layer(path, |layer| {
        layer.upsert_server(entry);
        Ok(())
    })?;

    if !ctx.json_output {
        let green = Style::new().green();
        println!("{} server '{}'", green.apply_to("Added"), args.name);
        if ctx.verbose {
            println!("  Saved to {}", path.display());
        }
    }
    Ok(())
}

fn run_remove(args: RemoveArgs, ctx: &Context) -> Result<()> {
    let path = user_file(ctx)?;
    if !edit_user_layer(path, |layer| Ok(layer.remove_server(&args.name)))? {
        anyhow::bail!("server '{}' is not in {}", args.name, path.display());
    }

    if !ctx.json_output {
        println!("Removed server '{}'", args.name);
    }
    Ok(())
}
