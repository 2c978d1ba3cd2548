//! Image upload extraction and validation.
//!
//! # Responsibilities
//! - Locate the image field in a multipart body
//! - Check filename and format before reading the payload
//! - Enforce the size limit while streaming the field
//!
//! # Design Decisions
//! - The client filename is only used for its extension; stored files are
//!   named by request id
//! - Oversized uploads stop being read as soon as the limit is crossed

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;

use crate::config::UploadConfig;
use crate::error::ApiError;
use crate::observability::metrics;

const MIB: usize = 1024 * 1024;

/// A validated image held in memory.
#[derive(Debug)]
pub struct ImageUpload {
    pub file_name: String,
    pub extension: String,
    pub data: Bytes,
}

/// Read and validate the configured image field.
pub async fn read_image(
    multipart: &mut Multipart,
    config: &UploadConfig,
) -> Result<ImageUpload, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, config))?
    {
        if field.name() != Some(config.field_name.as_str()) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let extension = validate_file_name(&file_name, config).inspect_err(|_| {
            metrics::record_upload_rejected("format");
        })?;

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, config))? {
            if data.len() + chunk.len() > config.max_bytes {
                return Err(too_large(config));
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(ImageUpload {
            file_name,
            extension,
            data: Bytes::from(data),
        });
    }

    metrics::record_upload_rejected("missing");
    Err(ApiError::MissingField(config.field_name.clone()))
}

/// Return the lower-cased extension of an acceptable file name.
///
/// The extension is whatever follows the last `.`; a name without a dot is
/// treated as its own extension.
pub fn validate_file_name(file_name: &str, config: &UploadConfig) -> Result<String, ApiError> {
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("No filename provided".to_string()));
    }

    let extension = file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    if !config.accepts(&extension) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported format. Supported: {}",
            config.supported_formats.join(", ")
        )));
    }
    Ok(extension)
}

fn describe_limit(max_bytes: usize) -> String {
    if max_bytes % MIB == 0 {
        format!("{}MB", max_bytes / MIB)
    } else {
        format!("{max_bytes} bytes")
    }
}

fn too_large(config: &UploadConfig) -> ApiError {
    metrics::record_upload_rejected("size");
    ApiError::BadRequest(format!(
        "File too large (max {})",
        describe_limit(config.max_bytes)
    ))
}

/// Map a multipart failure to an API error.
///
/// Hitting the request body limit is reported like any other oversized
/// image.
fn multipart_error(err: MultipartError, config: &UploadConfig) -> ApiError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(config);
    }
    ApiError::Multipart {
        status,
        message: err.body_text(),
    }
}
