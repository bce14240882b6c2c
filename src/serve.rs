//! Companion process mode
//!
//! A front-end process talks to the companion over stdio: one command per
//! line on stdin, one JSON message per line on stdout.
//!
//! ```text
//! > status
//! < {"channel":"device-code","payload":"8cda48..."}
//! > open screenlinkDesktop://deviceCode=abc
//! > upload /tmp/recording.webm Screen 1
//! < {"channel":"upload-finished","payload":"vid-1"}
//! ```

use crate::bridge::{UiBridge, UiCommand, UiEvent};
use anyhow::Result;
use screenlink_core::RendererMessage;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Parse one stdin line into a command
pub fn parse_line(line: &str) -> Result<Option<UiCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb {
        "startup" => UiCommand::Startup,
        "status" => UiCommand::GetStatus,
        "open" if !rest.is_empty() => UiCommand::PairingCallback {
            url: rest.to_string(),
        },
        "upload" if !rest.is_empty() => {
            let (path, title) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            UiCommand::UploadRecording {
                path: PathBuf::from(path),
                title: title.trim().to_string(),
            }
        }
        "link-device" => UiCommand::OpenNewDevice { launch: true },
        "permissions-missing" => UiCommand::PermissionsMissing,
        "quit" => UiCommand::Shutdown,
        _ => return Err(format!("Unknown command: {}", line)),
    };
    Ok(Some(command))
}

/// JSON line written for an event
pub fn event_json(event: &UiEvent) -> Value {
    let (channel, payload) = match event {
        UiEvent::Pairing(pairing) => return message_json(pairing.renderer_message()),
        UiEvent::Window(mode) => return message_json(RendererMessage::SetWindow(*mode)),
        UiEvent::CallbackRejected { message } => ("callback-rejected", json!(message)),
        UiEvent::UploadFinished { id } => ("upload-finished", json!(id)),
        UiEvent::UploadFailed { message } => ("upload-failed", json!(message)),
        UiEvent::RecordingSaved { path } => ("recording-saved", json!(path)),
        UiEvent::SaveFailed { message } => ("save-failed", json!(message)),
        UiEvent::NewDeviceOpened { url } => ("new-device-opened", json!(url)),
        UiEvent::NewDeviceFailed { message } => ("new-device-failed", json!(message)),
    };
    json!({ "channel": channel, "payload": payload })
}

fn message_json(message: RendererMessage) -> Value {
    serde_json::to_value(message).unwrap_or(Value::Null)
}

/// Serve stdio until `quit` or end of input
pub async fn run(ui: &mut UiBridge) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    ui.command_tx.send(UiCommand::Startup).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(UiCommand::Shutdown)) => break,
                    Ok(Some(command)) => ui.command_tx.send(command).await?,
                    Ok(None) => {}
                    Err(message) => {
                        warn!("{}", message);
                        println!("{}", json!({ "channel": "error", "payload": message }));
                    }
                }
            }
            event = ui.event_rx.recv() => {
                match event {
                    Ok(event) => println!("{}", event_json(&event)),
                    Err(RecvError::Lagged(skipped)) => warn!("Skipped {} events", skipped),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenlink_auth::PairingEvent;
    use screenlink_core::WindowMode;

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse_line("status"), Ok(Some(UiCommand::GetStatus))));
        assert!(matches!(parse_line("   "), Ok(None)));
        match parse_line("open screenlinkDesktop://deviceCode=abc") {
            Ok(Some(UiCommand::PairingCallback { url })) => {
                assert_eq!(url, "screenlinkDesktop://deviceCode=abc")
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_line("upload /tmp/a.webm Screen 1") {
            Ok(Some(UiCommand::UploadRecording { path, title })) => {
                assert_eq!(path, PathBuf::from("/tmp/a.webm"));
                assert_eq!(title, "Screen 1");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_line("open").is_err());
        assert!(parse_line("record").is_err());
    }

    #[test]
    fn test_event_json_uses_renderer_channels() {
        assert_eq!(
            event_json(&UiEvent::Pairing(PairingEvent::Unpaired)),
            json!({ "channel": "device-code", "payload": "" })
        );
        assert_eq!(
            event_json(&UiEvent::Window(WindowMode::Main)),
            json!({ "channel": "set-window", "payload": "main" })
        );
        assert_eq!(
            event_json(&UiEvent::UploadFinished { id: "vid-1".into() }),
            json!({ "channel": "upload-finished", "payload": "vid-1" })
        );
    }
}
