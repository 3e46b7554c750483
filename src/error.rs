//! Crate-wide error type

use thiserror::Error;

use crate::hub::HubError;

/// Top-level error for the relay's transports and binaries
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or listener I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hub rejected an operation
    #[error(transparent)]
    Hub(#[from] HubError),

    /// Peer violated the framing or message rules
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation needs an open connection
    #[error("not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, Error>;
