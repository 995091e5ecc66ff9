//! Error types for the beat decoding engine

use std::fmt;

/// Errors that can occur while building a tracking model or decoding activations
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Invalid tracker configuration (caught when the model is built)
    InvalidConfiguration(String),

    /// Activation sequence has no frames
    EmptyActivationSequence,

    /// No state reached the final frame with finite probability
    ///
    /// Indicates a malformed state space or transition model, not bad input.
    NoValidPath(String),

    /// Decoding was cancelled by the caller
    Cancelled,

    /// Activations do not fit the model (wrong channel count, etc.)
    InvalidInput(String),

    /// Reading or parsing an activation file failed
    Io(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            DecodeError::EmptyActivationSequence => write!(f, "Empty activation sequence"),
            DecodeError::NoValidPath(msg) => write!(f, "No valid path: {}", msg),
            DecodeError::Cancelled => write!(f, "Decoding cancelled"),
            DecodeError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            DecodeError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Io(format!("malformed activation JSON: {}", err))
    }
}
