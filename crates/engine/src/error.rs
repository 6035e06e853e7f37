//! Typed, non-realtime errors.
//!
//! Errors that can occur on the audio thread are never surfaced this way —
//! they are recovered locally and folded into diagnostics counters instead
//! (see `voice_scheduler`). These types cover the front-end's genuinely
//! fallible operations: controller misuse and sample loading.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("playback is already running")]
    AlreadyRunning,
    #[error("playback is not running")]
    NotRunning,
}

#[derive(Debug, Error, Clone)]
pub enum LoadError {
    #[error("sample not found: {0}")]
    NotFound(String),
    #[error("loader failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no output device available")]
    NoDevice,
    #[error("unsupported output stream config: {0}")]
    UnsupportedConfig(String),
    #[error("failed to build output stream: {0}")]
    BuildStream(String),
    #[error("failed to start output stream: {0}")]
    PlayStream(String),
}
