//! Runtime error types.

use cmdgraph_framework::{RepositoryError, RouterError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by a [`Gateway`](crate::gateway::Gateway) while delivering.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The transport refused or failed to send.
    #[error("Failed to deliver to {recipient}: {message}")]
    Send { recipient: String, message: String },

    /// The transport is gone.
    #[error("Gateway closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn send(recipient: impl ToString, message: impl Into<String>) -> Self {
        Self::Send {
            recipient: recipient.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that stop a bot runtime from starting or running.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The configured session has no declared connection.
    #[error("No connection declared for session <{0}>")]
    SessionNotFound(String),

    /// OS signal handlers could not be installed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
