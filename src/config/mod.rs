//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (optional)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc with the HTTP layer and the pipeline
//! ```
//!
//! # Design Decisions
//! - Every section has defaults, so running without a file is valid
//! - Validation separates syntactic (serde) from semantic checks
//! - Command-line overrides are applied before validation

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CorsConfig, DeviceConfig, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    PipelineConfig, StorageConfig, TimeoutConfig, TlsConfig, UploadConfig,
};
pub use validation::{validate_config, ValidationError};
