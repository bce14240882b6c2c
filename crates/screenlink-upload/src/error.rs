//! Upload error types

use screenlink_auth::PairingError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while uploading a recording
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Authentication required: pair this device before uploading")]
    AuthenticationRequired,

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error("Upload request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upload link request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected upload link response: {0}")]
    InvalidResponse(String),

    #[error("Upload transfer rejected with HTTP {status}")]
    TransferRejected { status: u16 },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UploadError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;
