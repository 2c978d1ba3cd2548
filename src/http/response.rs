//! Streaming of generated models back to the client.
//!
//! # Responsibilities
//! - Stream the GLB from disk without buffering it
//! - Set download headers (content type, length, filename)
//! - Keep the request's temp files alive until the body is done
//!
//! # Design Decisions
//! - The `RequestFiles` guard moves into the body stream; when hyper drops
//!   the body (completed or client gone) the files are scheduled for deletion

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use futures_util::Stream;
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::storage::RequestFiles;

pub const GLB_CONTENT_TYPE: &str = "model/gltf-binary";

/// Build a download response for the output of `files`.
pub async fn glb_download(files: RequestFiles) -> Result<Response, ApiError> {
    let file = tokio::fs::File::open(files.output()).await?;
    let length = file.metadata().await?.len();
    let disposition = format!("attachment; filename=\"{}\"", files.download_name());

    let body = Body::from_stream(GuardedStream {
        inner: ReaderStream::new(file),
        _files: files,
    });

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(GLB_CONTENT_TYPE));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| ApiError::Generation(e.to_string()))?,
    );
    Ok(response)
}

/// A byte stream that owns the temp files it reads from.
struct GuardedStream<S> {
    inner: S,
    _files: RequestFiles,
}

impl<S> Stream for GuardedStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
