//! hostmux server binary.
//!
//! Thin glue over the library: parse the command line, load and validate
//! configuration, bind listeners, start, and stop on ctrl-c. Everything
//! interesting lives in the library.

use std::path::PathBuf;

use clap::Parser;

use hostmux::config::{load_config, ServerConfig};
use hostmux::http::HostServer;
use hostmux::observability::init_logging;

#[derive(Parser)]
#[command(name = "hostmux", about = "Embeddable multi-context HTTP server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    tracing::info!(
        listeners = config.effective_listeners().len(),
        sessions = config.sessions.enabled,
        "Configuration loaded"
    );

    // Privileged phase: listener sockets bind here.
    let server = HostServer::bind(config)?;
    server.start().await?;

    for addr in server.local_addrs() {
        tracing::info!(address = %addr, "Serving");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    server.stop().await;
    server.destroy().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
