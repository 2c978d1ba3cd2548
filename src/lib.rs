//! Image-to-3D generation gateway library

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod storage;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};
