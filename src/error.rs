//! Error types for the voice call application

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline terminated abnormally: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
///
/// `Overflow` and `Underflow` are recoverable device reports, never
/// propagated past the pipeline loop that observes them. Everything else
/// is fatal to the owning pipeline.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Unsupported stream configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Failed to open stream: {0}")]
    StreamBuild(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Input overflow, captured data was dropped")]
    Overflow,

    #[error("Output underflow, device inserted filler")]
    Underflow,

    #[error("Stream closed")]
    Closed,
}

impl AudioError {
    /// Overflow and underflow are expected under load; the pipelines
    /// absorb them instead of shutting down.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AudioError::Overflow | AudioError::Underflow)
    }
}

/// Network errors
///
/// Receive timeouts and interrupted calls never appear here: timeouts are
/// reported as a distinct outcome by the endpoint and interrupts are
/// retried inside it.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Failed to resolve address {addr}: {reason}")]
    Resolve { addr: String, reason: String },

    #[error("Socket bind failed: {0}")]
    Bind(std::io::Error),

    #[error("Socket connect failed: {0}")]
    Connect(std::io::Error),

    #[error("Socket option failed: {0}")]
    SocketOption(std::io::Error),

    #[error("Send failed: {0}")]
    Send(std::io::Error),

    #[error("Receive failed: {0}")]
    Recv(std::io::Error),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
