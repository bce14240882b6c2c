//! Remote device code verification
//!
//! `POST {baseUrl}/api/devices/verify` with `{ "deviceCode": ... }`. Anything
//! other than a 200 response without a truthy `error` field is a failure.
//! No retries happen here; callers decide when to verify again.

use crate::device::{DeviceCode, DeviceIdentity};
use async_trait::async_trait;
use reqwest::StatusCode;
use screenlink_core::Config;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Path of the verification endpoint
pub const VERIFY_PATH: &str = "/api/devices/verify";

/// Verification errors
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Verification request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Verification timed out")]
    Timeout,
    #[error("Verification rejected with HTTP {status} {reason}")]
    Rejected { status: u16, reason: String },
    #[error("Verification failed: {0}")]
    Remote(String),
    #[error("Unexpected verification response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for VerificationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            VerificationError::Timeout
        } else {
            VerificationError::Transport(e)
        }
    }
}

impl VerificationError {
    /// The service looked at the code and refused it
    pub fn is_rejection(&self) -> bool {
        match self {
            VerificationError::Rejected { status, .. } => (400..500).contains(status),
            VerificationError::Remote(_) => true,
            _ => false,
        }
    }
}

pub type VerifyResult<T> = Result<T, VerificationError>;

/// Checks a device code against the authority that issued it
#[async_trait]
pub trait DeviceVerifier: Send + Sync {
    async fn verify(&self, code: &DeviceCode) -> VerifyResult<DeviceIdentity>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    device_code: &'a str,
}

/// Verifier backed by the remote HTTP API
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVerifier {
    /// Create a verifier for the configured service
    pub fn new(config: &Config) -> VerifyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.verify_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a verifier using an existing HTTP client
    pub fn with_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            endpoint: config.endpoint(VERIFY_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DeviceVerifier for HttpVerifier {
    async fn verify(&self, code: &DeviceCode) -> VerifyResult<DeviceIdentity> {
        debug!("Verifying device code {}", code.redacted());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&VerifyRequest {
                device_code: code.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Failed to verify device code: {} returned {}", self.endpoint, status);
            return Err(VerificationError::Rejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| VerificationError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.get("error").filter(|v| is_truthy(v)) {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            warn!("Failed to verify device code: {}", message);
            return Err(VerificationError::Remote(message));
        }

        serde_json::from_value(body).map_err(|e| VerificationError::InvalidResponse(e.to_string()))
    }
}

/// JavaScript truthiness, which is how the service's `error` field is meant
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
