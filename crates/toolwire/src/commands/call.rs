//! Call command - raw `tools/call` against any server.

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::{Map, Value};

use toolwire_mcp::McpClient;

use super::{Context, print_payload, with_server};

/// Arguments for the call command.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Server name
    pub server: String,

    /// Tool name
    pub tool: String,

    /// Tool arguments as a JSON object
    #[arg(long, default_value = "{}")]
    pub args: String,

    /// Timeout in seconds (default: configured call timeout)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Decode the JSON payload inside the tool's text content
    #[arg(long)]
    pub decode: bool,
}

/// Parse `--args` into an argument object.
fn parse_arguments(raw: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).context("--args is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => anyhow::bail!("--args must be a JSON object, got {other}"),
    }
}

/// Run the call command.
pub async fn run(args: CallArgs, ctx: &Context) -> Result<()> {
    let arguments = parse_arguments(&args.args)?;
    let tool = args.tool.as_str();
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.timeouts.call());

    let result = with_server(ctx, &args.server, false, async |client: &mut McpClient| {
        Ok(client.call_tool(tool, arguments, timeout).await?)
    })
    .await?;

    if args.decode {
        print_payload(&result.decode(), ctx)?;
    } else if ctx.json_output || result.texts().is_empty() {
        println!("{}", serde_json::to_string_pretty(result.as_value())?);
    } else {
        println!("{}", result.texts().join("\n"));
    }

    if result.is_error() {
        anyhow::bail!("tool '{tool}' reported an error");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        assert!(parse_arguments("{}").unwrap().is_empty());
        assert!(parse_arguments("null").unwrap().is_empty());
        let map = parse_arguments(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(map.get("message"), Some(&Value::from("hi")));
    }

    #[test]
    fn test_parse_arguments_rejects_non_objects() {
        assert!(parse_arguments("[1, 2]").is_err());
        assert!(parse_arguments("not json").is_err());
    }
}
