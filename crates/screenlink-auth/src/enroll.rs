//! New device enrollment
//!
//! Signing in starts in the browser: the app opens the service's "new
//! device" page, telling it what this machine is called and what it runs.
//! The service then calls back with a device code.

use tokio::process::Command;
use tracing::debug;

/// Path of the enrollment page on the remote service
pub const NEW_DEVICE_PATH: &str = "/app/devices/new";

/// Details sent to the enrollment page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    pub name: String,
    pub app_version: String,
    pub device_type: String,
}

impl DeviceDescription {
    /// Describe the current machine
    pub async fn current(app_version: &str) -> Self {
        Self {
            name: computer_name().await,
            app_version: app_version.to_string(),
            device_type: os_type().to_string(),
        }
    }
}

/// Build the enrollment URL for a device
pub fn new_device_url(base_url: &str, device: &DeviceDescription) -> String {
    format!(
        "{}{}?device={}&appVersion={}&deviceType={}",
        base_url.trim_end_matches('/'),
        NEW_DEVICE_PATH,
        urlencoding::encode(&device.name),
        urlencoding::encode(&device.app_version),
        urlencoding::encode(&device.device_type),
    )
}

/// OS type name as reported to the service
pub fn os_type() -> &'static str {
    match std::env::consts::OS {
        "macos" => "Darwin",
        "linux" => "Linux",
        "windows" => "Windows_NT",
        other => other,
    }
}

/// User-facing name of this computer
///
/// Uses the name the OS shows to the user where there is one, falling back
/// to the network hostname.
pub async fn computer_name() -> String {
    let pretty = match std::env::consts::OS {
        "macos" => command_output("scutil", &["--get", "ComputerName"]).await,
        "linux" => command_output("hostnamectl", &["--pretty"]).await,
        "windows" => std::env::var("COMPUTERNAME").ok(),
        _ => None,
    };

    pretty
        .filter(|name| !name.is_empty())
        .unwrap_or_else(fallback_hostname)
}

fn fallback_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn command_output(program: &str, args: &[&str]) -> Option<String> {
    match Command::new(program).args(args).output().await {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(output) => {
            debug!("{} exited with {}", program, output.status);
            None
        }
        Err(e) => {
            debug!("Failed to run {}: {}", program, e);
            None
        }
    }
}
