//! Pairing callback URL parsing
//!
//! The remote service hands a fresh device code back to the desktop app by
//! opening `<scheme>://deviceCode=<token>`. The token sits in the authority
//! component and is not escaped, so everything after the first `=` belongs
//! to it, including further `=` characters.

use crate::device::DeviceCode;
use thiserror::Error;

/// Key that must prefix the authority component
pub const DEVICE_CODE_KEY: &str = "deviceCode";

/// Callback parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("Not a URL: missing '://' in '{0}'")]
    MissingScheme(String),
    #[error("Unexpected URL scheme '{found}', expected '{expected}'")]
    UnexpectedScheme { expected: String, found: String },
    #[error("Callback URL does not carry a 'deviceCode=' parameter")]
    MissingDeviceCode,
    #[error("Callback URL carries an empty device code")]
    EmptyDeviceCode,
    #[error("Device code contains an invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Extract the device code from a pairing callback URL
pub fn parse_callback_url(url: &str, scheme: &str) -> Result<DeviceCode, CallbackError> {
    let url = url.trim();
    let (found, rest) = url
        .split_once("://")
        .ok_or_else(|| CallbackError::MissingScheme(url.to_string()))?;

    if !found.eq_ignore_ascii_case(scheme) {
        return Err(CallbackError::UnexpectedScheme {
            expected: scheme.to_string(),
            found: found.to_string(),
        });
    }

    let authority = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();

    let token = authority
        .strip_prefix(DEVICE_CODE_KEY)
        .and_then(|s| s.strip_prefix('='))
        .ok_or(CallbackError::MissingDeviceCode)?;

    if let Some(c) = token.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(CallbackError::InvalidCharacter(c));
    }

    DeviceCode::new(token).ok_or(CallbackError::EmptyDeviceCode)
}
