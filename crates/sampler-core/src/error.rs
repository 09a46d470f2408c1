//! Error types for Sampler.

use thiserror::Error;

/// Result type alias using Sampler's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Sampler.
#[derive(Error, Debug)]
pub enum Error {
    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Network error: {0}")]
    Network(String),

    // Audio errors
    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// HTTP-specific errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed with status {status}: {message}")]
    StatusError { status: u16, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Returns true if the error happened while fetching the resource,
    /// as opposed to decoding or playing it.
    pub const fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Network(_) | Self::Io(_))
    }

    /// Returns true if the payload was fetched but could not be decoded.
    pub const fn is_decode_failure(&self) -> bool {
        matches!(self, Self::AudioDecode(_) | Self::UnsupportedFormat(_))
    }
}
