//! Input loading
//!
//! Turns a path into an immutable [`InputArtifact`]: the raw bytes, the
//! detected container format, a SHA-256 digest and the decoded container
//! metadata. Loading is read-only and never retried.

use crate::container::{self, ContainerMetadata, ImageFormat, SUPPORTED_EXTENSIONS};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by [`load`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
}

impl LoadError {
    fn unreadable(path: &Path, reason: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// A loaded image file
#[derive(Debug, Clone)]
pub struct InputArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Lowercase hex SHA-256 of `bytes`
    pub sha256: String,
    pub container: ContainerMetadata,
}

/// Identifying facts about an artifact, carried into verdicts and reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub size: usize,
    pub sha256: String,
    pub dimensions: Option<(u32, u32)>,
}

impl InputArtifact {
    /// Build an artifact from bytes already in memory
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, LoadError> {
        let path = path.into();
        let format = ImageFormat::from_magic(&bytes)
            .ok_or_else(|| LoadError::unreadable(&path, "not a PNG, JPEG or WebP image"))?;

        if let Some(by_extension) = ImageFormat::from_path(&path) {
            if by_extension != format {
                warn!(
                    path = %path.display(),
                    extension = %by_extension,
                    detected = %format,
                    "file extension does not match content, using detected format"
                );
            }
        }

        let container = container::parse(format, &bytes)
            .map_err(|e| LoadError::unreadable(&path, e.to_string()))?;
        for warning in &container.warnings {
            debug!(path = %path.display(), "{}", warning);
        }

        let sha256 = hex::encode(Sha256::digest(&bytes));

        Ok(Self {
            path,
            bytes,
            format,
            sha256,
            container,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            path: self.path.clone(),
            format: self.format,
            size: self.len(),
            sha256: self.sha256.clone(),
            dimensions: self.container.dimensions,
        }
    }
}

/// Load an image file from disk
pub fn load(path: impl AsRef<Path>) -> Result<InputArtifact, LoadError> {
    let path = path.as_ref();

    let fs_meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LoadError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(LoadError::unreadable(path, e.to_string())),
    };
    if fs_meta.is_dir() {
        return Err(LoadError::unreadable(path, "is a directory"));
    }

    if ImageFormat::from_path(path).is_none() {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| "(none)".to_string());
        return Err(LoadError::unreadable(
            path,
            format!(
                "unsupported extension {} (supported: {})",
                ext,
                SUPPORTED_EXTENSIONS.join(", ")
            ),
        ));
    }

    let bytes = std::fs::read(path).map_err(|e| LoadError::unreadable(path, e.to_string()))?;
    let artifact = InputArtifact::from_bytes(path, bytes)?;

    debug!(
        path = %path.display(),
        format = %artifact.format,
        size = artifact.len(),
        "loaded artifact"
    );
    Ok(artifact)
}
