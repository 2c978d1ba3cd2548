//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, tracing span)
//!     → handlers.rs (route)
//!         → upload.rs (multipart field, format and size checks)
//!         → pipeline (generate GLB)
//!     → response.rs (stream GLB, release temp files)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod upload;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
