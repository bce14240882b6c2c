//! Presentation/async communication bridge
//!
//! Provides channels between whatever front-end hosts the companion (the
//! CLI here, a renderer process elsewhere) and the controller running on
//! the tokio runtime.

use screenlink_auth::PairingEvent;
use screenlink_core::{RendererMessage, WindowMode};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};

/// Events from the controller to the presentation layer
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Pairing outcome changed
    Pairing(PairingEvent),
    /// A window should switch view
    Window(WindowMode),
    /// A pairing callback URL could not be parsed
    CallbackRejected { message: String },
    /// Upload completed
    UploadFinished { id: String },
    /// Upload failed at any stage
    UploadFailed { message: String },
    /// Recording written to disk
    RecordingSaved { path: PathBuf },
    /// Recording could not be written
    SaveFailed { message: String },
    /// Enrollment page built (and opened, if requested)
    NewDeviceOpened { url: String },
    /// Enrollment page could not be opened
    NewDeviceFailed { message: String },
}

impl UiEvent {
    /// Message for the renderer, for events it has a channel for
    pub fn renderer_message(&self) -> Option<RendererMessage> {
        match self {
            UiEvent::Pairing(event) => Some(event.renderer_message()),
            UiEvent::Window(mode) => Some(RendererMessage::SetWindow(*mode)),
            _ => None,
        }
    }
}

/// Commands from the presentation layer to the controller
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// Main view loaded: show it and check the stored pairing
    Startup,
    /// Re-check the stored pairing
    GetStatus,
    /// A deep link arrived on the registered URL scheme
    PairingCallback { url: String },
    /// Upload a finished recording
    UploadRecording { path: PathBuf, title: String },
    /// Write a finished recording to a local file
    SaveRecording { path: PathBuf, recording: Vec<u8> },
    /// Start enrollment in the browser
    OpenNewDevice { launch: bool },
    /// OS capture permissions are missing
    PermissionsMissing,
    /// Shutdown the controller
    Shutdown,
}

/// Handle for the presentation side
pub struct UiBridge {
    /// Channel to send commands to the controller
    pub command_tx: mpsc::Sender<UiCommand>,
    /// Channel to receive events from the controller
    pub event_rx: broadcast::Receiver<UiEvent>,
}

/// Handle for the controller side
pub struct AsyncBridge {
    /// Channel to receive commands from the presentation layer
    pub command_rx: mpsc::Receiver<UiCommand>,
    /// Channel to send events to the presentation layer
    pub event_tx: broadcast::Sender<UiEvent>,
}

/// Create a new bridge pair
pub fn create_bridge() -> (UiBridge, AsyncBridge) {
    let (command_tx, command_rx) = mpsc::channel::<UiCommand>(32);
    let (event_tx, event_rx) = broadcast::channel::<UiEvent>(64);

    let ui_bridge = UiBridge {
        command_tx,
        event_rx,
    };

    let async_bridge = AsyncBridge {
        command_rx,
        event_tx,
    };

    (ui_bridge, async_bridge)
}
