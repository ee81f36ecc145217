//! Error types for packop-reveal
//!
//! Only construction and the hosting surface can fail. The resolver and the
//! stage sequencer absorb every runtime failure and degrade instead.

use thiserror::Error;

/// Main error type for packop-reveal
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP client or server errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Invalid card input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] packop_common::Error),
}

/// Convenience Result type using packop-reveal Error
pub type Result<T> = std::result::Result<T, Error>;
