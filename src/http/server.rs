//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, CORS, timeout, body limit, metrics)
//! - Serve over plain TCP or TLS until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, Request},
    middleware,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{CorsConfig, GatewayConfig};
use crate::http::{handlers, request};
use crate::http::middleware::track_requests;
use crate::pipeline::{DeviceReport, PipelineManager};
use crate::storage::TempWorkspace;

/// Multipart framing allowance on top of the image size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub pipeline: Arc<PipelineManager>,
    pub workspace: Arc<TempWorkspace>,
    pub devices: DeviceReport,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl HttpServer {
    /// Create a new HTTP server around the given state.
    pub fn new(state: AppState) -> Self {
        let config = Arc::clone(&state.config);
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(handlers::service_info))
            .route("/health", get(handlers::health))
            .route("/generate-3d", post(handlers::generate_model))
            .route_layer(middleware::from_fn(track_requests))
            .layer(DefaultBodyLimit::max(
                config.upload.max_bytes.saturating_add(MULTIPART_OVERHEAD),
            ))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(request::set_request_id_layer())
                    .layer(
                        TraceLayer::new_for_http()
                            .make_span_with(|req: &Request<Body>| request::make_span(req)),
                    )
                    .layer(request::propagate_request_id_layer())
                    .layer(cors_layer(&config.cors))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// The router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTPS server draining connections");
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allow_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
