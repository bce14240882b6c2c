//! Upload destination requests
//!
//! `POST {baseUrl}/api/uploads` with `Authorization: Bearer <device code>`
//! and `{ "sourceTitle": ... }` returns `{ "uploadLink": ..., "id": ... }`.

use crate::error::{UploadError, UploadResult};
use reqwest::header::AUTHORIZATION;
use screenlink_auth::DeviceCode;
use screenlink_core::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Path of the upload link endpoint
pub const UPLOADS_PATH: &str = "/api/uploads";

/// Title used when the recording source has no name
pub const DEFAULT_TITLE: &str = "Recording";

/// One-time destination for a recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDestination {
    /// Pre-signed URL accepting a single PUT
    #[serde(rename = "uploadLink")]
    pub url: String,
    /// Identifier of the video on the service
    pub id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest<'a> {
    source_title: &'a str,
}

/// Client for the upload endpoints
#[derive(Debug, Clone)]
pub struct UploadClient {
    pub(crate) client: reqwest::Client,
    endpoint: String,
    /// Where in-memory recordings are staged; the system temp dir if unset
    pub(crate) staging_dir: Option<PathBuf>,
}

impl UploadClient {
    /// Create a client for the configured service
    pub fn new(config: &Config) -> UploadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client using an existing HTTP client
    pub fn with_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            endpoint: config.endpoint(UPLOADS_PATH),
            staging_dir: None,
        }
    }

    /// Stage in-memory recordings in `dir`
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Ask the service where to upload a recording
    ///
    /// Fails with `AuthenticationRequired` without contacting the service
    /// when no device code is available.
    pub async fn request_upload_destination(
        &self,
        device_code: Option<&DeviceCode>,
        title: &str,
    ) -> UploadResult<UploadDestination> {
        let code = device_code.ok_or(UploadError::AuthenticationRequired)?;
        let title = if title.trim().is_empty() {
            DEFAULT_TITLE
        } else {
            title
        };
        debug!("Requesting upload link for '{}'", title);

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", code.as_str()))
            .json(&UploadRequest {
                source_title: title,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Failed to get upload link: HTTP {} {}", status, message);
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: if message.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown").to_string()
                } else {
                    message
                },
            });
        }

        let destination: UploadDestination = response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        info!("Got upload link for video {}", destination.id);
        Ok(destination)
    }
}
