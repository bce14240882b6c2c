//! ScreenLink - desktop companion for screen recordings
//!
//! Pairs this computer with a ScreenLink account and uploads finished
//! recordings to it.

mod bridge;
mod controller;
mod serve;

use anyhow::{anyhow, bail, Result};
use bridge::{create_bridge, UiBridge, UiCommand, UiEvent};
use clap::{Parser, Subcommand};
use controller::{AppContext, AppController};
use screenlink_auth::PairingEvent;
use screenlink_core::Config;
use screenlink_upload::recording;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// ScreenLink - record locally, share instantly
#[derive(Parser, Debug)]
#[command(name = "screenlink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the ScreenLink service
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory for session data (device code)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify the stored device code and show the pairing status
    Status,

    /// Handle a pairing callback URL (screenlinkDesktop://deviceCode=...)
    Open {
        /// The URL delivered by the OS
        url: String,
    },

    /// Upload a finished recording
    Upload {
        /// Recording file
        file: PathBuf,

        /// Title of the recorded source
        #[arg(short, long, default_value = "")]
        title: String,
    },

    /// Save a recording to a local file
    Save {
        /// Recording file to save
        source: PathBuf,

        /// Destination (default: ./content-<millis>.webm)
        #[arg(long)]
        to: Option<PathBuf>,
    },

    /// Run as a companion process, speaking JSON lines over stdio
    Serve,

    /// Sign in on the web to pair this computer
    LinkDevice {
        /// Print the URL instead of opening the browser
        #[arg(long)]
        print_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.into())
                .add_directive("hyper=warn".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("ScreenLink v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let context = AppContext::new(config)?;

    let (mut ui, async_bridge) = create_bridge();
    let controller = tokio::spawn(AppController::new(async_bridge, context).run());

    let outcome = run_command(args.command, &mut ui).await;

    ui.command_tx.send(UiCommand::Shutdown).await.ok();
    controller.await??;
    outcome
}

/// Configuration file first, then command-line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.clone());
    }
    if let Some(data_dir) = &args.data_dir {
        config = config.with_data_dir(data_dir.clone());
    }
    config.validate()?;
    debug!("Using service at {}", config.api_base());
    Ok(config)
}

async fn run_command(command: Command, ui: &mut UiBridge) -> Result<()> {
    match command {
        Command::Status => {
            ui.command_tx.send(UiCommand::GetStatus).await?;
            report_pairing(ui).await
        }
        Command::Open { url } => {
            ui.command_tx.send(UiCommand::PairingCallback { url }).await?;
            report_pairing(ui).await
        }
        Command::Upload { file, title } => {
            ui.command_tx
                .send(UiCommand::UploadRecording { path: file, title })
                .await?;
            let id = wait_for(ui, |event| match event {
                UiEvent::UploadFinished { id } => Some(Ok(id)),
                UiEvent::UploadFailed { message } => Some(Err(anyhow!(message))),
                _ => None,
            })
            .await??;
            println!("Uploaded: {}", id);
            Ok(())
        }
        Command::Save { source, to } => {
            let recording = tokio::fs::read(&source).await?;
            let path = to.unwrap_or_else(|| PathBuf::from(recording::suggested_file_name()));
            ui.command_tx
                .send(UiCommand::SaveRecording { path, recording })
                .await?;
            let path = wait_for(ui, |event| match event {
                UiEvent::RecordingSaved { path } => Some(Ok(path)),
                UiEvent::SaveFailed { message } => Some(Err(anyhow!(message))),
                _ => None,
            })
            .await??;
            println!("Saved: {}", path.display());
            Ok(())
        }
        Command::LinkDevice { print_only } => {
            ui.command_tx
                .send(UiCommand::OpenNewDevice {
                    launch: !print_only,
                })
                .await?;
            let url = wait_for(ui, |event| match event {
                UiEvent::NewDeviceOpened { url } => Some(Ok(url)),
                UiEvent::NewDeviceFailed { message } => Some(Err(anyhow!(message))),
                _ => None,
            })
            .await??;
            println!("{}", url);
            Ok(())
        }
        Command::Serve => serve::run(ui).await,
    }
}

/// Print the pairing outcome; failures become a non-zero exit
async fn report_pairing(ui: &mut UiBridge) -> Result<()> {
    let outcome = wait_for(ui, |event| match event {
        UiEvent::Pairing(PairingEvent::Paired { device, .. }) => {
            Some(Ok(format!("Paired as {}", device)))
        }
        UiEvent::Pairing(PairingEvent::Unpaired) => Some(Ok(
            "Not paired. Run `screenlink link-device` to sign in.".to_string(),
        )),
        UiEvent::Pairing(PairingEvent::VerificationFailed { reason }) => Some(Err(anyhow!(
            "Device code could not be verified: {}",
            reason
        ))),
        UiEvent::Pairing(PairingEvent::PairingSaveFailed { reason }) => Some(Err(anyhow!(reason))),
        UiEvent::CallbackRejected { message } => {
            Some(Err(anyhow!("Invalid pairing link: {}", message)))
        }
        _ => None,
    })
    .await??;
    println!("{}", outcome);
    Ok(())
}

/// Wait for the first event `pick` maps to a value
async fn wait_for<T, F>(ui: &mut UiBridge, pick: F) -> Result<T>
where
    F: Fn(UiEvent) -> Option<T>,
{
    loop {
        match ui.event_rx.recv().await {
            Ok(event) => {
                if let Some(message) = event.renderer_message() {
                    debug!("Renderer message on {}: {:?}", message.channel(), message);
                }
                if let Some(value) = pick(event) {
                    return Ok(value);
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!("Skipped {} events", skipped),
            Err(RecvError::Closed) => bail!("Controller stopped unexpectedly"),
        }
    }
}
