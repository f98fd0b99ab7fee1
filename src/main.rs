use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use turnstile::admission::AdmissionGate;
use turnstile::config::GatewayConfig;
use turnstile::http::{AppState, HttpServer};
use turnstile::metrics::Metrics;
use turnstile::routing::{Dispatcher, RouteTable};
use turnstile::store::RedisTokenStore;

#[derive(Parser, Debug)]
#[command(name = "turnstile", about = "Token-gated API gateway", version)]
struct Args {
    /// Path to the gateway configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Turnstile API Gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    info!(
        port = config.server.port,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    // Connect the shared token store; the client lives for the whole
    // process and is injected into everything that needs it.
    let store = Arc::new(RedisTokenStore::connect(&config.redis).await?);

    let gate = Arc::new(AdmissionGate::new(store.clone()));
    let table = RouteTable::from_config(&config.routes);
    let dispatcher = Arc::new(Dispatcher::new(
        table,
        Duration::from_secs(config.upstream.timeout_secs),
    )?);
    let metrics = Arc::new(Metrics::new()?);
    info!("Admission pipeline initialized");

    let state = AppState {
        gate,
        dispatcher,
        store,
        metrics,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let server = HttpServer::new(addr, state);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Turnstile API Gateway stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
