//! Error types and Result alias for the cold-chain tracking client

use thiserror::Error;

/// Main error type for the tracking client
#[derive(Error, Debug)]
pub enum Error {
    /// Connection-level failure (network unreachable, handshake refused, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed or unrecognized inbound frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// `send()` attempted while the connection was not open
    #[error("Send rejected: connection is not open")]
    SendRejected,

    /// Automatic reconnection gave up after the configured number of attempts
    #[error("Reconnect exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Bearer token expired")]
    TokenExpired,

    #[error("API request failed: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
