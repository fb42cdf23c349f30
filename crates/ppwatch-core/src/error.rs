//! Error types for the PPPoE watchdog
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for watchdog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the PPPoE watchdog
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal before the loop starts)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup could not resolve the interface address or PPPoE session
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// The router answered with a non-success status
    #[error("Gateway error ({status}): {message}")]
    Gateway {
        /// HTTP status code returned by the router
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The request never produced a response (connect, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a gateway error from a response status and body
    pub fn gateway(status: u16, message: impl Into<String>) -> Self {
        Self::Gateway {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Whether the router reported the addressed resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Gateway { status: 404, .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
