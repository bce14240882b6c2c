//! Persistent storage for the device code
//!
//! A single text file holding the raw token, by default
//! `~/.local/share/screenlink/deviceCode.txt`. A missing file means the
//! installation is unpaired.

use crate::device::DeviceCode;
use screenlink_core::Config;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Session data directory not found")]
    NoDataDir,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Single-slot device code storage with file persistence
#[derive(Debug, Clone)]
pub struct DeviceCodeStore {
    /// Path to the device code file
    path: PathBuf,
}

impl DeviceCodeStore {
    /// Create a store at the location configured for this installation
    pub fn from_config(config: &Config) -> StorageResult<Self> {
        let path = config
            .device_code_path()
            .map_err(|_| StorageError::NoDataDir)?;
        Ok(Self::with_path(path))
    }

    /// Create a store at a specific path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the persisted code
    ///
    /// The token is written to a sibling file first and renamed over the
    /// old one, so readers never observe a partially written code.
    pub async fn write(&self, code: &DeviceCode) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(parent, e))?;
        }

        let tmp = self.path.with_extension("txt.tmp");
        tokio::fs::write(&tmp, code.as_str())
            .await
            .map_err(|e| self.io_error(&tmp, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_error(&self.path, e));
        }

        info!("Saved device code {} to {:?}", code.redacted(), self.path);
        Ok(())
    }

    /// Read the persisted code, or an empty string if none was ever written
    pub async fn read(&self) -> StorageResult<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No device code stored at {:?}", self.path);
                Ok(String::new())
            }
            Err(e) => Err(self.io_error(&self.path, e)),
        }
    }

    /// Read the persisted code as a `DeviceCode`
    pub async fn load(&self) -> StorageResult<Option<DeviceCode>> {
        Ok(DeviceCode::new(self.read().await?))
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
