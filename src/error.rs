//! Error types for Playback

use std::io;
use thiserror::Error;

/// Result type for Playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Errors that can occur in Playback
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Required constructor argument missing or unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Control operation attempted from a disallowed state
    #[error("Cannot {operation} while the player is {state}")]
    InvalidState {
        /// Operation that was attempted
        operation: &'static str,
        /// State the player was in
        state: &'static str,
    },

    /// Play or record requested with no cassette loaded
    #[error("No cassette loaded")]
    CassetteNotLoaded,

    /// Named record does not exist in the loaded cassette
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Read past the last exchange of a record
    #[error("End of record: {0}")]
    EndOfRecord(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cassette file is not the expected JSON shape
    #[error("Invalid cassette format: {0}")]
    InvalidFormat(String),

    /// Outbound HTTP failure that produced no response
    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl PlaybackError {
    /// State-violation error for a control operation.
    pub(crate) fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        Self::InvalidState { operation, state }
    }
}
