//! Startup orchestration.
//!
//! # Responsibilities
//! - Prepare the temp directory and start the cleanup worker
//! - Probe devices and build the pipeline manager
//! - Hand the assembled state to the HTTP server
//!
//! # Design Decisions
//! - Fail fast on storage problems; a missing GPU or a failed preload is
//!   only logged
//! - Subsystems initialize in order, not concurrently

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::http::{AppState, HttpServer};
use crate::pipeline::{devices, CommandGenerator, MeshGenerator, PipelineManager};
use crate::storage::{sweep_leftovers, Janitor, TempWorkspace};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to prepare temp directory {path}: {source}")]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// A fully assembled gateway, ready to serve.
pub struct Gateway {
    server: HttpServer,
    janitor: JoinHandle<()>,
    shutdown_grace: Duration,
}

impl Gateway {
    /// Build a gateway that runs the configured external pipeline.
    pub async fn build(config: GatewayConfig) -> Result<Self, StartupError> {
        let generator = Arc::new(CommandGenerator::from_config(&config.pipeline));
        Self::with_generator(config, generator).await
    }

    /// Build a gateway around any generator.
    pub async fn with_generator(
        config: GatewayConfig,
        generator: Arc<dyn MeshGenerator>,
    ) -> Result<Self, StartupError> {
        let temp_dir = config.storage.temp_dir.clone();
        let (janitor, worker) = Janitor::new(&config.storage);
        let workspace = TempWorkspace::open(&temp_dir, janitor)
            .await
            .map_err(|source| StartupError::TempDir {
                path: temp_dir.clone(),
                source,
            })?;

        if config.storage.sweep_on_startup {
            match sweep_leftovers(&temp_dir).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Removed temp files from a previous run"),
                Err(e) => tracing::warn!(error = %e, "Startup sweep failed"),
            }
        }
        let janitor = tokio::spawn(worker.run());

        let devices = devices::detect(&config.devices).await;

        let pipeline = Arc::new(PipelineManager::new(generator, &config.pipeline));
        if config.pipeline.preload {
            if let Err(e) = pipeline.ensure_loaded().await {
                tracing::warn!(error = %e, "Pipeline preload failed; retrying on first request");
            }
        }

        tracing::info!(
            temp_dir = %temp_dir.display(),
            generator = %pipeline.generator_name(),
            max_concurrent_jobs = config.pipeline.max_concurrent_jobs,
            "Gateway assembled"
        );

        let shutdown_grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);
        let server = HttpServer::new(AppState {
            config: Arc::new(config),
            pipeline,
            workspace: Arc::new(workspace),
            devices,
        });

        Ok(Self {
            server,
            janitor,
            shutdown_grace,
        })
    }

    /// The router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.server.router()
    }

    /// Serve plain HTTP until `shutdown` fires, then finish cleanup.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), StartupError> {
        let Self {
            server,
            janitor,
            shutdown_grace,
        } = self;
        let result = server.run(listener, shutdown).await;
        finish_cleanup(janitor, shutdown_grace).await;
        result.map_err(StartupError::from)
    }

    /// Serve HTTPS until `shutdown` fires, then finish cleanup.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), StartupError> {
        let Self {
            server,
            janitor,
            shutdown_grace,
        } = self;
        let result = server.run_tls(addr, tls, shutdown).await;
        finish_cleanup(janitor, shutdown_grace).await;
        result.map_err(StartupError::from)
    }
}

/// Wait for the janitor, which stops once the last request has released its files.
async fn finish_cleanup(janitor: JoinHandle<()>, grace: Duration) {
    match tokio::time::timeout(grace, janitor).await {
        Ok(Ok(())) => tracing::info!("Temp file cleanup finished"),
        Ok(Err(e)) => tracing::error!(error = %e, "Cleanup worker failed"),
        Err(_) => tracing::warn!(
            grace_secs = grace.as_secs(),
            "Timed out waiting for temp file cleanup"
        ),
    }
}
