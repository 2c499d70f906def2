//! Error types for Pawflux

use thiserror::Error;

/// Errors that can occur while extracting, aggregating or encoding records
#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid regex pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Interchange error on line {line}: {reason}")]
    InterchangeError { line: usize, reason: String },

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Errors raised by the completion dispatch layer
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unsupported content type: {0}")]
    InvalidContentType(String),

    #[error("Image payload is empty")]
    EmptyImage,

    #[error("Unknown analysis mode: {0}")]
    UnknownMode(String),

    #[error("ARK_API_KEY is not set")]
    MissingApiKey,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed upstream response: {0}")]
    InvalidResponse(String),

    #[error("Upstream returned an empty completion")]
    EmptyCompletion,
}

impl DispatchError {
    /// True for errors caused by the caller's input rather than the upstream
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DispatchError::InvalidContentType(_)
                | DispatchError::EmptyImage
                | DispatchError::UnknownMode(_)
        )
    }
}
