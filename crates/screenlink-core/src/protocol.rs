//! Presentation-layer message types
//!
//! Messages pushed from the companion process to the renderer. Each message
//! travels on a named channel with a single payload.

use serde::{Deserialize, Serialize};

/// Which view a renderer window should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Missing OS permissions prompt
    Permissions,
    /// Main recording setup view
    Main,
    /// Floating recording controls
    Floating,
    /// Webcam overlay
    Webcam,
}

impl WindowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowMode::Permissions => "permissions",
            WindowMode::Main => "main",
            WindowMode::Floating => "floating",
            WindowMode::Webcam => "webcam",
        }
    }
}

impl std::fmt::Display for WindowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages sent to the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "kebab-case")]
pub enum RendererMessage {
    /// Device code token, empty when unpaired, or a human-readable error
    DeviceCode(String),
    /// Switch the window to another view
    SetWindow(WindowMode),
}

impl RendererMessage {
    /// Channel name the renderer listens on
    pub fn channel(&self) -> &'static str {
        match self {
            RendererMessage::DeviceCode(_) => "device-code",
            RendererMessage::SetWindow(_) => "set-window",
        }
    }
}
