//! Error types for tcpmux.

use thiserror::Error;

/// Main error type for all tcpmux operations.
#[derive(Debug, Error)]
pub enum MuxError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ring buffer append exceeded the fixed capacity.
    ///
    /// Connection-fatal: either a framing bug or a hostile peer.
    #[error("buffer overflow: {requested} bytes requested, {available} available")]
    BufferOverflow { requested: usize, available: usize },

    /// A frame declared a payload larger than the configured maximum.
    #[error("message of {length} bytes exceeds maximum {max}")]
    MessageTooLarge { length: u64, max: usize },

    /// Protocol error (unknown frame type, truncated stream source, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration (empty endpoint list, zero buffer size, etc.).
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type alias using MuxError.
pub type Result<T> = std::result::Result<T, MuxError>;
