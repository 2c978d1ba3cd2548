//! Per-request temp file allocation.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::storage::janitor::Janitor;

/// The temp directory shared by all requests.
pub struct TempWorkspace {
    root: PathBuf,
    janitor: Janitor,
}

impl TempWorkspace {
    /// Create the directory if needed and bind it to a janitor.
    pub async fn open(root: impl Into<PathBuf>, janitor: Janitor) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, janitor })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Temp files tracked but not yet deleted.
    pub fn pending_cleanups(&self) -> usize {
        self.janitor.pending()
    }

    /// Reserve input and output paths for one request.
    ///
    /// `extension` must already be validated; it becomes part of a file name.
    pub fn allocate(&self, request_id: Uuid, extension: &str) -> RequestFiles {
        let input = self.root.join(format!("input_{request_id}.{extension}"));
        let output = self.root.join(format!("output_{request_id}.glb"));
        self.janitor.track(&input);
        self.janitor.track(&output);

        RequestFiles {
            request_id,
            input,
            output,
            janitor: self.janitor.clone(),
        }
    }
}

/// Input and output paths of one request.
///
/// Dropping the value schedules both files for deletion, so whoever holds it
/// last (the handler on failure, the response body on success) decides when
/// cleanup happens.
pub struct RequestFiles {
    request_id: Uuid,
    input: PathBuf,
    output: PathBuf,
    janitor: Janitor,
}

impl RequestFiles {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// File name offered to the client.
    pub fn download_name(&self) -> String {
        format!("model_{}.glb", self.request_id)
    }
}

impl Drop for RequestFiles {
    fn drop(&mut self) {
        tracing::debug!(request_id = %self.request_id, "Scheduling temp file cleanup");
        self.janitor.schedule(std::mem::take(&mut self.input));
        self.janitor.schedule(std::mem::take(&mut self.output));
    }
}
