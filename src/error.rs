//! Error types shared by the loader, the session lifecycle and the sink.
//!
//! Every failure that can happen before playback starts is reported through
//! [`PlayerError`]. Once a session is loaded, rendering cannot fail: no I/O
//! happens on that path.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for midiplay operations.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors that can occur while preparing or driving playback.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The asset was missing from every candidate location.
    #[error("asset '{name}' not found (searched {searched:?})")]
    NotFound {
        /// Logical asset name that was requested.
        name: String,
        /// Every path that was tried, in lookup order.
        searched: Vec<PathBuf>,
    },

    /// Decompression failed, the length did not match, or the MIDI data is malformed.
    #[error("decode error: {0}")]
    Decode(String),

    /// The synthesis engine or the audio output could not be initialized.
    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    /// An operation was requested in a lifecycle state that does not allow it.
    #[error("invalid precondition: {0}")]
    InvalidPrecondition(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Self::InvalidPrecondition(msg.into())
    }
}
