pub mod browse_cmd;
pub mod config;
pub mod list_cmd;
pub mod render_cmd;
pub mod serve;
pub mod session;
pub mod source;
pub mod state_file;
pub mod table;
pub mod tracing_setup;

use anyhow::Result;
use browse_cmd::BrowseArgs;
use clap::Parser;
use clap::Subcommand;
use list_cmd::CheckArgs;
use list_cmd::ListArgs;
use render_cmd::RenderArgs;
use serve::ServeArgs;
use session::Runtime;
use std::path::PathBuf;

/// Inspect and serve a versioned-release dataset.
#[derive(Debug, Parser)]
#[command(name = "repoversion", version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Args)]
pub struct GlobalArgs {
    /// Dataset file path or http(s) URL (overrides `dataset` in config.toml)
    #[arg(long, global = true, env = "REPOVERSION_DATASET", value_name = "PATH|URL")]
    pub dataset: Option<String>,

    /// Config file (defaults to $REPOVERSION_HOME/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a machine endpoint body for a query such as `?format=code&app=a1`
    Render(RenderArgs),

    /// Show the filtered, sorted release table
    List(ListArgs),

    /// Interactive filter session reading commands from stdin
    Browse(BrowseArgs),

    /// Report dataset diagnostics and severity totals
    Check(CheckArgs),

    /// Serve endpoints and the interactive view over HTTP
    Serve(ServeArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let runtime = Runtime::resolve(&self.global)?;
        match self.command {
            Command::Render(args) => render_cmd::run_render(&runtime, args).await,
            Command::List(args) => list_cmd::run_list(&runtime, args).await,
            Command::Browse(args) => browse_cmd::run_browse(&runtime, args).await,
            Command::Check(args) => list_cmd::run_check(&runtime, args).await,
            Command::Serve(args) => serve::run_serve(runtime, args).await,
        }
    }
}
