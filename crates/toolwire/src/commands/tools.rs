//! Tools command - lists the tools a server offers.

use anyhow::Result;
use clap::Args;
use console::Style;

use toolwire_mcp::McpClient;

use super::{Context, truncate, with_server};

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Server name
    pub server: String,

    /// Allow for first-run provisioning (long listing timeout)
    #[arg(long)]
    pub first_run: bool,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let server = args.server.as_str();
    let tools = with_server(ctx, server, args.first_run, async |client: &mut McpClient| {
        client
            .list_tools()
            .await
            .into_result()
            .map_err(|e| anyhow::anyhow!("failed to list tools on '{server}': {e}"))
    })
    .await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    if tools.is_empty() {
        println!("No tools available on '{server}'.");
        return Ok(());
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();
    println!("{} ({})", bold.apply_to(server), tools.len());
    for tool in &tools {
        println!("  {:<28} {}", tool.name, dim.apply_to(truncate(&tool.description, 60)));
        if ctx.verbose && !tool.input_schema.is_null() {
            println!("{}", serde_json::to_string_pretty(&tool.input_schema)?);
        }
    }

    Ok(())
}
