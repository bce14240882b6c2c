//! Local recording save

use crate::error::{UploadError, UploadResult};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

/// Suggested file name for a recording finished at `now`
pub fn default_file_name(now: DateTime<Utc>) -> String {
    format!("content-{}.webm", now.timestamp_millis())
}

/// Suggested file name for a recording finishing now
pub fn suggested_file_name() -> String {
    default_file_name(Utc::now())
}

/// Write a recording to disk, creating missing parent directories
pub async fn save_recording(path: &Path, recording: &[u8]) -> UploadResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| UploadError::io(parent, e))?;
    }
    tokio::fs::write(path, recording)
        .await
        .map_err(|e| UploadError::io(path, e))?;
    info!("Video saved to {:?}", path);
    Ok(())
}
