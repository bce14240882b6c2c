//! Recording transfer to the upload destination

use crate::destination::{UploadClient, UploadDestination};
use crate::error::{UploadError, UploadResult};
use screenlink_auth::DeviceCode;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Identifier of the video on the service
    pub id: String,
    /// Size of the uploaded file in bytes
    pub bytes: u64,
}

impl UploadClient {
    /// PUT a file to a destination URL
    pub async fn put_file(&self, url: &str, path: &Path) -> UploadResult<u64> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::io(path, e))?;
        let len = body.len() as u64;

        let response = self.client.put(url).body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Failed to upload video to {}: HTTP {}", url, status);
            return Err(UploadError::TransferRejected {
                status: status.as_u16(),
            });
        }

        debug!("Uploaded {} bytes from {:?}", len, path);
        Ok(len)
    }

    /// Upload a recording file and wait for the transfer to finish
    pub async fn upload_file(
        &self,
        device_code: Option<&DeviceCode>,
        path: &Path,
        title: &str,
    ) -> UploadResult<UploadReceipt> {
        // Fail on a missing file before asking for a link
        tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadError::io(path, e))?;

        let UploadDestination { url, id } =
            self.request_upload_destination(device_code, title).await?;
        let bytes = self.put_file(&url, path).await?;

        info!("Video {} uploaded successfully ({} bytes)", id, bytes);
        Ok(UploadReceipt { id, bytes })
    }

    /// Upload an in-memory recording
    ///
    /// The bytes are staged in a temporary `.webm` file which is removed
    /// when the upload ends, whether it succeeded or not.
    pub async fn upload_bytes(
        &self,
        device_code: Option<&DeviceCode>,
        recording: &[u8],
        title: &str,
    ) -> UploadResult<UploadReceipt> {
        let dir = self
            .staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let staged = tempfile::Builder::new()
            .prefix("temp-")
            .suffix(".webm")
            .tempfile_in(&dir)
            .map_err(|e| UploadError::io(&dir, e))?;

        let written = async {
            let mut file = tokio::fs::File::from_std(staged.reopen()?);
            file.write_all(recording).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = written {
            let err = UploadError::io(staged.path(), e);
            if let Err(e) = staged.close() {
                warn!("Failed to delete temporary recording: {}", e);
            }
            return Err(err);
        }
        debug!("Staged recording at {:?}", staged.path());

        let result = self.upload_file(device_code, staged.path(), title).await;

        if let Err(e) = staged.close() {
            warn!("Failed to delete temporary recording: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use screenlink_core::Config;
    use tempfile::tempdir;

    fn code() -> DeviceCode {
        DeviceCode::new("abc123").unwrap()
    }

    async fn mock_link(server: &mut Server) -> mockito::Mock {
        let link = format!("{}/storage/vid-1", server.url());
        server
            .mock("POST", "/api/uploads")
            .match_header("authorization", "Bearer abc123")
            .with_status(200)
            .with_body(format!(r#"{{ "uploadLink": "{}", "id": "vid-1" }}"#, link))
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_upload_file_requests_link_then_puts() {
        let mut server = Server::new_async().await;
        let link_mock = mock_link(&mut server).await;
        let put_mock = server
            .mock("PUT", "/storage/vid-1")
            .match_body(Matcher::Exact("webm-bytes".into()))
            .with_status(200)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let path = dir.path().join("recording.webm");
        std::fs::write(&path, "webm-bytes").unwrap();

        let client = UploadClient::new(&Config::new().with_base_url(server.url())).unwrap();
        let receipt = client
            .upload_file(Some(&code()), &path, "Screen 1")
            .await
            .unwrap();

        link_mock.assert_async().await;
        put_mock.assert_async().await;
        assert_eq!(
            receipt,
            UploadReceipt {
                id: "vid-1".into(),
                bytes: 10
            }
        );
    }

    fn staged_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("temp-") && name.ends_with(".webm"))
            .collect()
    }

    #[tokio::test]
    async fn test_upload_bytes_removes_staged_file() {
        let mut server = Server::new_async().await;
        mock_link(&mut server).await;
        let put_mock = server
            .mock("PUT", "/storage/vid-1")
            .match_body(Matcher::Exact("data".into()))
            .with_status(200)
            .create_async()
            .await;
        let staging = tempdir().unwrap();

        let client = UploadClient::new(&Config::new().with_base_url(server.url()))
            .unwrap()
            .with_staging_dir(staging.path());
        let receipt = client
            .upload_bytes(Some(&code()), b"data", "Screen 1")
            .await
            .unwrap();

        put_mock.assert_async().await;
        assert_eq!(receipt.bytes, 4);
        assert!(staged_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_transfer_failure_is_reported() {
        let mut server = Server::new_async().await;
        mock_link(&mut server).await;
        server
            .mock("PUT", "/storage/vid-1")
            .with_status(403)
            .create_async()
            .await;
        let staging = tempdir().unwrap();

        let client = UploadClient::new(&Config::new().with_base_url(server.url()))
            .unwrap()
            .with_staging_dir(staging.path());
        let result = client.upload_bytes(Some(&code()), b"data", "Screen 1").await;

        assert!(matches!(
            result,
            Err(UploadError::TransferRejected { status: 403 })
        ));
        assert!(staged_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_request() {
        let mut server = Server::new_async().await;
        let link_mock = server
            .mock("POST", "/api/uploads")
            .expect(0)
            .create_async()
            .await;

        let client = UploadClient::new(&Config::new().with_base_url(server.url())).unwrap();
        let result = client
            .upload_file(Some(&code()), Path::new("/nonexistent/recording.webm"), "x")
            .await;

        assert!(matches!(result, Err(UploadError::Io { .. })));
        link_mock.assert_async().await;
    }
}
