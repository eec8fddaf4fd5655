//! Docs command - AWS documentation search, read and recommendations.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{Map, Value};

use toolwire_mcp::{AwsDocsTools, Backend, McpClient};

use super::{Context, print_payload, with_server};

/// Arguments for the docs command.
#[derive(Args, Debug)]
pub struct DocsArgs {
    /// Server to use
    #[arg(long, global = true, default_value = Backend::AwsDocs.server_name())]
    pub server: String,

    #[command(subcommand)]
    pub command: DocsCommand,
}

#[derive(Subcommand, Debug)]
pub enum DocsCommand {
    /// Search the documentation
    Search {
        /// Search phrase
        query: String,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Read a documentation page as markdown
    Read {
        /// Page URL
        url: String,

        /// Maximum characters to return
        #[arg(long)]
        max_length: Option<u64>,

        /// Character offset to start from
        #[arg(long)]
        start_index: Option<u64>,
    },

    /// Pages related to a documentation page
    Recommend {
        /// Page URL
        url: String,
    },
}

fn extras(pairs: &[(&str, Option<u64>)]) -> Map<String, Value> {
    pairs
        .iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), Value::from(v))))
        .collect()
}

/// Run the docs command.
pub async fn run(args: DocsArgs, ctx: &Context) -> Result<()> {
    let command = args.command;

    let payload = with_server(ctx, &args.server, false, async |client: &mut McpClient| {
        let mut docs = AwsDocsTools::new(client);
        let payload = match command {
            DocsCommand::Search { query, limit } => {
                docs.search_documentation(&query, extras(&[("limit", limit)]))
                    .await?
            }
            DocsCommand::Read {
                url,
                max_length,
                start_index,
            } => {
                let extra = extras(&[("max_length", max_length), ("start_index", start_index)]);
                Value::String(docs.read_documentation(&url, extra).await?)
            }
            DocsCommand::Recommend { url } => docs.recommend(&url).await?,
        };
        Ok(payload)
    })
    .await?;

    print_payload(&payload, ctx)
}
