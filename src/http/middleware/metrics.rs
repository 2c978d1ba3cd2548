//! Per-route request metrics.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics;

/// Record count and latency of every routed request.
///
/// Installed as a route layer so the matched route template, not the raw
/// path, becomes the label.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}
