use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that abort an ingestion run.
///
/// Documents rejected individually by the backend are not errors; they are
/// collected in [`IngestReport::failed_documents`](crate::models::IngestReport).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("resource not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {message}", path.display())]
    Decoding { path: PathBuf, message: String },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl IngestError {
    /// Map an I/O error on `path`, keeping "not found" distinct.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            IngestError::ResourceNotFound { path }
        } else {
            IngestError::Io { path, source: err }
        }
    }
}
