//! Validation of binary glTF (GLB) output.
//!
//! The container is split with `gltf::Glb` and the JSON chunk is parsed and
//! validated as a glTF 2.0 document. Mesh data itself is not decoded.

use std::path::Path;

use gltf::{Glb, Gltf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlbError {
    #[error("not a GLB 2.0 container: {0}")]
    Container(#[source] gltf::Error),

    #[error("GLB header declares {declared} bytes but file has {actual}")]
    LengthMismatch { declared: u64, actual: u64 },

    #[error("GLB JSON chunk is not a valid glTF document: {0}")]
    Document(#[source] gltf::Error),

    #[error("failed to read GLB: {0}")]
    Io(#[from] std::io::Error),
}

/// Facts about a valid GLB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbInfo {
    pub version: u32,
    pub length: u64,
    pub json_length: usize,
    pub has_binary_chunk: bool,
    pub meshes: usize,
}

/// Validate a complete GLB held in memory.
pub fn inspect(bytes: &[u8]) -> Result<GlbInfo, GlbError> {
    let glb = Glb::from_slice(bytes).map_err(GlbError::Container)?;

    let declared = u64::from(glb.header.length);
    let actual = bytes.len() as u64;
    if declared != actual {
        return Err(GlbError::LengthMismatch { declared, actual });
    }

    let gltf = Gltf::from_slice(bytes).map_err(GlbError::Document)?;

    Ok(GlbInfo {
        version: glb.header.version,
        length: actual,
        json_length: glb.json.len(),
        has_binary_chunk: glb.bin.is_some(),
        meshes: gltf.document.meshes().count(),
    })
}

/// Validate a GLB file on disk.
pub async fn inspect_file(path: &Path) -> Result<GlbInfo, GlbError> {
    let bytes = tokio::fs::read(path).await?;
    inspect(&bytes)
}
