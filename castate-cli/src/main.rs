//! castate CLI - drives the state adapter against a scripted SDK

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod demo;
mod render;

#[derive(Debug, Parser)]
#[command(name = "castate", version, about = "Chain-abstraction state adapter demo")]
struct Cli {
    /// Adapter config file (defaults to ./castate.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overriding the configured one
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a full transfer: session, balances, allowance, intent, progress
    Demo(demo::DemoArgs),
    /// Feed progress events from a JSON file through the adapter
    Replay {
        /// File holding an array of `{"type": ..., "data": ...}` events
        file: PathBuf,
    },
    /// Print the effective configuration
    ShowConfig,
    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = config::DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        config::init(path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(filter) = cli.log {
        config = config.with_log_filter(filter);
    }
    castate::logging::init(&config.log_filter)?;
    tracing::debug!(slot = %config.provider_slot, "configuration loaded");

    match cli.command {
        Command::Demo(args) => demo::run(config, args).await,
        Command::Replay { file } => demo::replay(config, &file).await,
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}
