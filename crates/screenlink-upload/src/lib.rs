//! ScreenLink Upload
//!
//! Moves finished recordings off the machine:
//!
//! - **Destination**: asks the service for a one-time upload link,
//!   authenticated with the device code.
//! - **Transfer**: PUTs the recording to that link and reports the outcome
//!   to the caller instead of firing and forgetting.
//! - **Recording**: saves a recording to a local path chosen by the user.

mod destination;
mod error;
pub mod recording;
mod transfer;

pub use destination::{UploadClient, UploadDestination, DEFAULT_TITLE, UPLOADS_PATH};
pub use error::{UploadError, UploadResult};
pub use transfer::UploadReceipt;
