//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that the pipeline template can receive the job paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("listener.tls requires both cert_path and key_path")]
    IncompleteTls,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("upload.max_bytes must be greater than zero")]
    ZeroUploadLimit,

    #[error("upload.field_name must not be empty")]
    EmptyFieldName,

    #[error("upload.supported_formats must list at least one format")]
    NoSupportedFormats,

    #[error("pipeline.program must not be empty")]
    EmptyProgram,

    #[error("pipeline.args must reference the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("pipeline.max_concurrent_jobs must be greater than zero")]
    ZeroConcurrency,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::IncompleteTls);
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    let upload = &config.upload;
    if upload.max_bytes == 0 {
        errors.push(ValidationError::ZeroUploadLimit);
    }
    if upload.field_name.trim().is_empty() {
        errors.push(ValidationError::EmptyFieldName);
    }
    if upload.supported_formats.iter().all(|f| f.trim().is_empty()) {
        errors.push(ValidationError::NoSupportedFormats);
    }

    let pipeline = &config.pipeline;
    if pipeline.program.trim().is_empty() {
        errors.push(ValidationError::EmptyProgram);
    }
    for placeholder in ["{input}", "{output}"] {
        if !pipeline.args.iter().any(|a| a.contains(placeholder)) {
            errors.push(ValidationError::MissingPlaceholder(placeholder));
        }
    }
    if pipeline.max_concurrent_jobs == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }
    if pipeline.generation_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("pipeline.generation_timeout_secs"));
    }
    if pipeline.load_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("pipeline.load_timeout_secs"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
