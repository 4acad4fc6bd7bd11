//! Domain error types

use thiserror::Error;

/// Errors that can occur while estimating parameters or decoding RTTY
///
/// Framing anomalies (false starts, truncated frames, reserved codes, silence)
/// are deliberately absent: the decoder degrades to "emit nothing" for those
/// and only counts them in `DecodeStats`.
#[derive(Error, Debug)]
pub enum RttyError {
    #[error("FSK parameters undetermined: {0}")]
    ParameterUndetermined(String),

    #[error("Invalid FSK parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RTTY operations
pub type RttyResult<T> = Result<T, RttyError>;
