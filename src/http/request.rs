//! Request identification.
//!
//! # Responsibilities
//! - Assign a UUID v4 `x-request-id` when the client sent none
//! - Echo the id on the response
//! - Open a tracing span per request carrying the id
//!
//! # Design Decisions
//! - The id is set before the trace layer runs so every log line has it
//! - The id labels logs only; temp files are named by their own id

use axum::http::{HeaderName, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that assigns missing request ids.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request id onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// The request id of `request`, if one is set.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span factory for `TraceLayer`.
pub fn make_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id(request),
        method = %request.method(),
        path = %request.uri().path(),
    )
}
