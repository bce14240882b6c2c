//! Application Controller
//!
//! Owns the application context and serves commands from the bridge.
//! Long-running work (verification, uploads) runs in spawned tasks so a
//! pairing callback can arrive while an earlier verification is pending.

use crate::bridge::{AsyncBridge, UiCommand, UiEvent};
use anyhow::{Context, Result};
use screenlink_auth::{
    new_device_url, parse_callback_url, DeviceCodeStore, DeviceDescription, HttpVerifier,
    PairingController, PairingError,
};
use screenlink_core::{Config, WindowMode};
use screenlink_upload::{recording, UploadClient, UploadReceipt, UploadResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Everything handlers need, created once per run
pub struct AppContext {
    pub config: Config,
    pub pairing: PairingController<HttpVerifier>,
    pub uploads: UploadClient,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let store = DeviceCodeStore::from_config(&config)
            .context("Failed to locate device code storage")?;
        info!("Device code storage: {:?}", store.path());

        let verifier = HttpVerifier::new(&config).context("Failed to create HTTP client")?;
        let pairing =
            PairingController::new(store, verifier).with_verify_timeout(config.verify_timeout());
        let uploads = UploadClient::new(&config).context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            pairing,
            uploads,
        })
    }

    /// Verify the pairing, then upload a recording file
    pub async fn upload_recording(&self, path: &Path, title: &str) -> UploadResult<UploadReceipt> {
        let code = match self.pairing.verified_code().await {
            Ok(code) => Some(code),
            Err(PairingError::AuthenticationRequired) => None,
            Err(e) => return Err(e.into()),
        };
        self.uploads.upload_file(code.as_ref(), path, title).await
    }
}

/// Controller serving bridge commands
pub struct AppController {
    bridge: AsyncBridge,
    context: Arc<AppContext>,
}

impl AppController {
    pub fn new(bridge: AsyncBridge, context: AppContext) -> Self {
        Self {
            bridge,
            context: Arc::new(context),
        }
    }

    /// Run the controller - listens for commands until shutdown
    pub async fn run(mut self) -> Result<()> {
        info!("Controller started");
        let forwarder = self.forward_pairing_events();

        while let Some(command) = self.bridge.command_rx.recv().await {
            match command {
                UiCommand::Startup => {
                    self.show_window(WindowMode::Main);
                    self.spawn_status_check();
                }
                UiCommand::GetStatus => {
                    self.spawn_status_check();
                }
                UiCommand::PairingCallback { url } => {
                    self.handle_callback(&url);
                }
                UiCommand::UploadRecording { path, title } => {
                    self.spawn_upload(path, title);
                }
                UiCommand::SaveRecording { path, recording } => {
                    self.spawn_save(path, recording);
                }
                UiCommand::OpenNewDevice { launch } => {
                    self.spawn_open_new_device(launch);
                }
                UiCommand::PermissionsMissing => {
                    self.show_window(WindowMode::Permissions);
                }
                UiCommand::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        forwarder.abort();
        info!("Controller stopped");
        Ok(())
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.bridge.event_tx.send(event);
    }

    fn show_window(&self, mode: WindowMode) {
        debug!("Showing {} window", mode);
        self.emit(UiEvent::Window(mode));
    }

    /// Relay pairing events to the presentation layer in publish order
    fn forward_pairing_events(&self) -> tokio::task::JoinHandle<()> {
        let mut pairing_rx = self.context.pairing.subscribe();
        let event_tx = self.bridge.event_tx.clone();
        tokio::spawn(async move {
            loop {
                match pairing_rx.recv().await {
                    Ok(event) => {
                        let _ = event_tx.send(UiEvent::Pairing(event));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dropped {} pairing events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn spawn_status_check(&self) {
        let context = self.context.clone();
        tokio::spawn(async move {
            context.pairing.get_status().await;
        });
    }

    fn handle_callback(&self, url: &str) {
        match parse_callback_url(url, &self.context.config.url_scheme) {
            Ok(code) => {
                let context = self.context.clone();
                tokio::spawn(async move {
                    context.pairing.on_pairing_callback(code).await;
                });
            }
            Err(e) => {
                warn!("Ignoring pairing callback: {}", e);
                self.emit(UiEvent::CallbackRejected {
                    message: e.to_string(),
                });
            }
        }
    }

    fn spawn_upload(&self, path: PathBuf, title: String) {
        let context = self.context.clone();
        let event_tx = self.bridge.event_tx.clone();
        tokio::spawn(async move {
            let event = match context.upload_recording(&path, &title).await {
                Ok(receipt) => UiEvent::UploadFinished { id: receipt.id },
                Err(e) => {
                    warn!("Failed to upload {:?}: {}", path, e);
                    UiEvent::UploadFailed {
                        message: e.to_string(),
                    }
                }
            };
            let _ = event_tx.send(event);
        });
    }

    fn spawn_save(&self, path: PathBuf, recording: Vec<u8>) {
        let event_tx = self.bridge.event_tx.clone();
        tokio::spawn(async move {
            let event = match recording::save_recording(&path, &recording).await {
                Ok(()) => UiEvent::RecordingSaved { path },
                Err(e) => UiEvent::SaveFailed {
                    message: e.to_string(),
                },
            };
            let _ = event_tx.send(event);
        });
    }

    fn spawn_open_new_device(&self, launch: bool) {
        let context = self.context.clone();
        let event_tx = self.bridge.event_tx.clone();
        tokio::spawn(async move {
            let device = DeviceDescription::current(env!("CARGO_PKG_VERSION")).await;
            let url = new_device_url(&context.config.base_url, &device);
            debug!("Enrollment URL: {}", url);

            let event = if !launch {
                UiEvent::NewDeviceOpened { url }
            } else {
                match open::that_detached(&url) {
                    Ok(()) => UiEvent::NewDeviceOpened { url },
                    Err(e) => UiEvent::NewDeviceFailed {
                        message: format!("Failed to open browser: {}", e),
                    },
                }
            };
            let _ = event_tx.send(event);
        });
    }
}
