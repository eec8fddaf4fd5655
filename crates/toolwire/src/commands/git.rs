//! Git command - typed git operations through `mcp-server-git`.

use anyhow::Result;
use clap::{Args, Subcommand};

use toolwire_mcp::{Backend, GitTools, McpClient};

use super::{Context, print_payload, with_server};

/// Arguments for the git command.
#[derive(Args, Debug)]
pub struct GitArgs {
    /// Repository path (default: the server's working directory)
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Server to use
    #[arg(long, global = true, default_value = Backend::Git.server_name())]
    pub server: String,

    #[command(subcommand)]
    pub command: GitCommand,
}

#[derive(Subcommand, Debug)]
pub enum GitCommand {
    /// Show the working tree status
    Status,

    /// Show recent commits
    Log {
        /// Number of commits
        #[arg(short = 'n', long)]
        max_count: Option<u32>,
    },

    /// Show unstaged changes, or staged ones with --cached
    Diff {
        /// Diff the index instead of the working tree
        #[arg(long)]
        cached: bool,
    },

    /// Stage files
    Add {
        /// Files to stage
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Commit staged changes
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
    },
}

/// Run the git command.
pub async fn run(args: GitArgs, ctx: &Context) -> Result<()> {
    let repo = args.repo.as_deref();
    let command = args.command;

    let result = with_server(ctx, &args.server, false, async |client: &mut McpClient| {
        let mut git = GitTools::new(client);
        let result = match command {
            GitCommand::Status => git.status(repo).await?,
            GitCommand::Log { max_count } => git.log(repo, max_count).await?,
            GitCommand::Diff { cached } => git.diff(repo, cached).await?,
            GitCommand::Add { files } => git.add(&files, repo).await?,
            GitCommand::Commit { message } => git.commit(&message, repo).await?,
        };
        Ok(result)
    })
    .await?;

    print_payload(&result.decode(), ctx)?;
    if result.is_error() {
        anyhow::bail!("git server reported an error");
    }
    Ok(())
}
