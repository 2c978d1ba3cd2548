//! The seam between the gateway and the opaque image-to-mesh model.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::glb::GlbError;

/// Failures surfaced by a generator or by output validation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    LoadFailed(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("pipeline exited with {}: {stderr}", exit_label(.code))]
    Exited { code: Option<i32>, stderr: String },

    #[error("pipeline produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("pipeline produced an empty output file")]
    EmptyOutput,

    #[error("pipeline output is not a valid GLB: {0}")]
    InvalidOutput(#[from] GlbError),

    #[error("all generation slots are busy")]
    Busy,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// One generation request: read `input`, write a GLB to `output`.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub request_id: Uuid,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl GenerationJob {
    pub fn new(request_id: Uuid, input: &Path, output: &Path) -> Self {
        Self {
            request_id,
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        }
    }
}

/// An image-to-mesh backend.
#[async_trait]
pub trait MeshGenerator: Send + Sync {
    /// Short name for logs and health output.
    fn name(&self) -> &str;

    /// Make the model ready. Called at most once successfully.
    async fn load(&self) -> Result<(), PipelineError>;

    /// Run one job. On success `job.output` holds the exported mesh.
    async fn generate(&self, job: &GenerationJob) -> Result<(), PipelineError>;
}
