//! Image-to-3D generation gateway
//!
//! Accepts an image over HTTP, runs it through a shape-generation pipeline
//! and streams the resulting GLB back to the client.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                ┌──────────────────────────────────────────────┐
//!     ──── POST image ─────▶│  http (upload checks) ──▶ storage (temp dir)  │
//!                           │          │                       ▲           │
//!                           │          ▼                       │ cleanup   │
//!                           │  pipeline manager ──▶ generator (process)     │
//!                           │          │                                    │
//!     ◀──── GLB stream ─────│  http (response) ◀── output GLB               │
//!                           │                                               │
//!                           │  config · lifecycle · observability           │
//!                           └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mesh_gateway::config::{load_config, validate_config, GatewayConfig};
use mesh_gateway::lifecycle::{Gateway, Shutdown};
use mesh_gateway::net::load_tls_config;
use mesh_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "mesh-gateway", version)]
#[command(about = "HTTP gateway that turns images into 3D models", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override storage.temp_dir
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Load the pipeline before accepting requests
    #[arg(long)]
    preload: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if let Some(dir) = args.temp_dir {
        config.storage.temp_dir = dir;
    }
    if args.preload {
        config.pipeline.preload = true;
    }
    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            eprintln!("config error: {e}");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mesh-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        temp_dir = %config.storage.temp_dir.display(),
        max_upload_bytes = config.upload.max_bytes,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let gateway = Gateway::build(config).await?;

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            let rustls = load_tls_config(&tls).await?;
            gateway.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            gateway.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
