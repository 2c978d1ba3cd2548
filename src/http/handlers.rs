//! Route handlers.

use axum::{
    extract::{Multipart, State},
    response::Response,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::response;
use crate::http::server::AppState;
use crate::http::upload;
use crate::pipeline::GenerationJob;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub status: &'static str,
    pub supported_formats: Vec<String>,
    pub temp_dir: String,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub pipeline_loaded: bool,
    pub cuda_available: bool,
    pub device_count: usize,
    pub jobs_in_flight: usize,
    pub pending_cleanups: usize,
    pub temp_dir: String,
}

/// `GET /`
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "3D Model Generator API",
        status: "healthy",
        supported_formats: state.config.upload.supported_formats.clone(),
        temp_dir: state.workspace.root().display().to_string(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        pipeline_loaded: state.pipeline.is_loaded(),
        cuda_available: state.devices.cuda_available,
        device_count: state.devices.device_count,
        jobs_in_flight: state.pipeline.jobs_in_flight(),
        pending_cleanups: state.workspace.pending_cleanups(),
        temp_dir: state.workspace.root().display().to_string(),
    })
}

/// `POST /generate-3d`
///
/// Accepts an image and responds with the generated GLB. The request's temp
/// files are deleted once the response body has been sent, or right away if
/// anything fails.
pub async fn generate_model(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let image = upload::read_image(&mut multipart, &state.config.upload).await?;

    let files = state.workspace.allocate(Uuid::new_v4(), &image.extension);
    tracing::info!(
        request_id = %files.request_id(),
        file_name = %image.file_name,
        bytes = image.data.len(),
        "Processing generation request"
    );

    tokio::fs::write(files.input(), &image.data).await?;
    tracing::debug!(request_id = %files.request_id(), path = %files.input().display(), "Saved input");

    let job = GenerationJob::new(files.request_id(), files.input(), files.output());
    state.pipeline.generate(&job).await?;

    response::glb_download(files).await
}
