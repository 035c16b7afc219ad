//! PhotoChain command-line client entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use photochain_protocol::FailureKind;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photochain")]
#[command(about = "Upload photos to a PhotoChain network and inspect its chain")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the configuration
    #[arg(long, global = true, env = "PHOTOCHAIN_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Register {
        username: String,
        #[arg(long, env = "PHOTOCHAIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and remember the session
    Login {
        username: String,
        #[arg(long, env = "PHOTOCHAIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Upload a photo, register it on the chain, mine and confirm
    Upload { file: PathBuf },
    /// Show the chain and its integrity
    Chain {
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Mine pending transactions into a block
    Mine,
    /// List the configured nodes
    Nodes,
    /// Ask a node to simulate a failure
    Simulate {
        node_id: u32,
        /// node_down, network_delay, data_corruption or hash_corruption
        kind: FailureKind,
    },
    /// Download a stored image
    Image { id: i64, out: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting photochain");

    let config = config::ClientConfig::load(cli.config.as_deref())?.with_api_url(cli.api_url);
    tracing::debug!(api_url = %config.api_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli.command, config))
}
