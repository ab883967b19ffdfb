//! canopy - workspace tree synchronization from the command line

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

/// canopy - Keep a live mirror of a workspace directory
#[derive(Parser)]
#[command(name = "canopy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a workspace, stream notifications as JSON lines and read
    /// commands as JSON lines from stdin
    Watch {
        /// Workspace root directory
        path: PathBuf,

        /// Config file (default: <config dir>/canopy/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Poll instead of using native notifications
        #[arg(long)]
        polling: bool,
    },
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all configuration values
    List,
    /// Get a single value
    Get {
        /// Key such as watcher.poll_interval_ms
        key: String,
    },
    /// Set a single value
    Set { key: String, value: String },
    /// Show the config file path and whether it is loaded
    Path,
    /// Write a commented config with the default values
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
        /// Print to stdout instead of writing the file
        #[arg(long, conflicts_with = "force")]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON stream
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { path, config, polling } => cmd::watch::run(path, config, polling).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
            ConfigCommands::Path => cmd::config::run_path().await,
            ConfigCommands::Init { force, stdout } => cmd::config::run_init(force, stdout).await,
        },
    }
}
