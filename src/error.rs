//! Error types for the zentropy library.
//!
//! The entropy and checksum engines themselves never fail on valid input;
//! these errors cover the surfaces around them (option validation, caller
//! supplied output buffers, and file I/O in the command-line tool).

use thiserror::Error;

/// Result type alias for zentropy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the compression context and its drivers.
#[derive(Debug, Error)]
pub enum Error {
    /// Memory level outside `1..=9`.
    #[error("invalid memory level {0}: must be 1-9")]
    InvalidMemLevel(u8),

    /// Caller-provided output buffer cannot hold the encoded stream.
    #[error("output buffer too small: need {required} bytes, got {provided}")]
    BufferTooSmall {
        /// Number of bytes the encoded stream needs.
        required: usize,
        /// Number of bytes the caller provided.
        provided: usize,
    },

    /// I/O error from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a buffer too small error.
    pub fn buffer_too_small(required: usize, provided: usize) -> Self {
        Error::BufferTooSmall { required, provided }
    }

    /// Whether retrying with different parameters can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::BufferTooSmall { .. })
    }
}
