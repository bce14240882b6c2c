//! ScreenLink Core - Shared types for the desktop companion
//!
//! This crate provides the configuration, error type and presentation-layer
//! messages used across all ScreenLink components.

pub mod config;
pub mod error;
pub mod protocol;

pub use config::Config;
pub use error::{Error, Result};
pub use protocol::{RendererMessage, WindowMode};
