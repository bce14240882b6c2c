//! Device code and device identity types
//!
//! A device code is the opaque token linking this installation to a remote
//! account. The identity is whatever the remote service resolves it to.

use serde::{Deserialize, Serialize};

/// Opaque pairing token issued by the remote service
///
/// Always non-empty. `Debug` is redacted so the full token never ends up in
/// log output.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceCode(String);

impl DeviceCode {
    /// Wrap a token, returning `None` for an empty string
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form safe for logs (first 6 characters)
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{}…", prefix)
    }
}

impl TryFrom<String> for DeviceCode {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DeviceCode::new(value).ok_or("device code must not be empty")
    }
}

impl From<DeviceCode> for String {
    fn from(code: DeviceCode) -> Self {
        code.0
    }
}

impl AsRef<str> for DeviceCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for DeviceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DeviceCode").field(&self.redacted()).finish()
    }
}

/// Identity the remote service resolved a device code to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Remote device identifier
    #[serde(default)]
    pub id: String,
    /// Device name as registered on the account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining fields of the verification response
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => f.write_str(&self.id),
        }
    }
}
