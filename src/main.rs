//! Switchboard Server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Loaded from `--config`, or the first of
//! `$CONFIG_DIR/switchboard/config.toml`, `/etc/switchboard/config.toml`,
//! `./switchboard.toml`. Environment variables override file values:
//! - `SWITCHBOARD_HOST`, `SWITCHBOARD_PORT`
//! - `SWITCHBOARD_BROADCAST_CAPACITY`
//! - `SWITCHBOARD_LOG_LEVEL`, `SWITCHBOARD_LOG_FORMAT`
//! - `RUST_LOG`: overrides the log level entirely

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use switchboard::config::generate_default_config;
use switchboard::{logging, processors, server, Config, Hub};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Message hub serving request/response and broadcast over WebSocket")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the hub and serve it over WebSocket
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print a default config file
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = match config {
                Some(path) => Config::load_with_env(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => Config::load_default(),
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            run_server(config).await
        }
        Commands::InitConfig => {
            print!("{}", generate_default_config());
            Ok(())
        }
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    logging::init(&config.logging).context("initializing logging")?;

    tracing::info!("Starting Switchboard v{}", env!("CARGO_PKG_VERSION"));

    let hub = Hub::new(config.hub.clone());
    processors::register_builtin(&hub)?;
    tracing::info!(processors = ?hub.processor_types(), "Registered processors");

    server::serve(hub, &config.server).await?;

    tracing::info!("Switchboard stopped");
    Ok(())
}
