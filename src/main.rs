//! CORS forwarding proxy
//!
//! Relays browser requests to arbitrary public URLs and attaches CORS
//! headers to every response.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                   CORS PROXY                      │
//!                        │                                                   │
//!     Browser Request    │  ┌────────┐   ┌─────────┐   ┌────────┐   ┌──────┐ │
//!     ───────────────────┼─▶│ http   │──▶│ routing │──▶│security│──▶│ http │─┼──▶ Upstream
//!                        │  │ server │   │ target  │   │ policy │   │forward│ │
//!                        │  └────────┘   └─────────┘   │ guard  │   └──┬───┘ │
//!                        │                             └────────┘      │     │
//!     Browser Response   │  ┌────────┐                                 │     │
//!     ◀──────────────────┼──│  cors  │◀────────────────────────────────┘     │
//!                        │  └────────┘                                       │
//!                        │  config · observability · lifecycle               │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use cors_proxy::config::load_config;
use cors_proxy::lifecycle::{signals, Shutdown};
use cors_proxy::observability::{logging, metrics};
use cors_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "cors-proxy")]
#[command(about = "Stateless CORS forwarding proxy", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address (e.g. 127.0.0.1:8080).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!("cors-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        mount_path = %config.listener.mount_path,
        rate_limit = config.rate_limit.requests_per_window,
        allow_credentials = config.cors.allow_credentials,
        "Configuration loaded"
    );

    if let Some(address) = &config.observability.metrics_address {
        let addr: SocketAddr = address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
