// ABOUTME: Main entry point for the pinion chat front-ends
// ABOUTME: Loads .env and config, initializes logging, then runs the terminal chat or the HTTP gateway

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pinion::{
    config::Config, gateway, logging, terminal::Terminal, ChannelHandler, ClientRegistry,
    SessionRegistry, UpdatePoller,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pinion", about = "Chat with pinion conversational agents", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal chat
    Chat {
        /// Path to the .aia agent file to run; credentials are used when it fails to load
        #[arg(short = 'f', long)]
        aia_file: Option<PathBuf>,

        /// Client backend to use
        #[arg(short, long)]
        backend: Option<String>,
    },
    /// Serve the HTTP chat gateway for web, Slack and Teams hosts
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let mut config = Config::load()?;

    match &cli.command {
        Commands::Chat { aia_file, backend } => {
            if let Some(path) = aia_file {
                config.client.aia_file = Some(path.clone());
            }
            if let Some(backend) = backend {
                config.client.backend = backend.clone();
            }
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.web.host = host.clone();
            }
            if let Some(port) = port {
                config.web.port = *port;
            }
        }
    }
    config.validate()?;

    let _log_guard = logging::init(&config.logging, &config.log_dir());
    tracing::info!(backend = %config.client.backend, "Configuration loaded");

    let clients = Arc::new(ClientRegistry::default());
    if !clients.available().contains(&config.client.backend.as_str()) {
        anyhow::bail!(
            "Unknown backend '{}' (available: {})",
            config.client.backend,
            clients.available().join(", ")
        );
    }
    let poller = UpdatePoller::new(config.poller.clone());

    match cli.command {
        Commands::Chat { .. } => {
            let stdin = std::io::stdin();
            let mut terminal = Terminal::new(stdin.lock(), std::io::stdout(), clients, poller);
            let reason = terminal.run(&config.client)?;
            tracing::info!(?reason, "Terminal chat finished");
        }
        Commands::Serve { .. } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to build tokio runtime")?;
            let sessions = Arc::new(SessionRegistry::new(clients));
            let handler = ChannelHandler::new(sessions, config.client.clone(), poller);
            runtime.block_on(gateway::serve(&config, handler))?;
        }
    }

    Ok(())
}
