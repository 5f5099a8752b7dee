//! Error types for the cmdgraph framework.

use std::io;

use cmdgraph_core::DeclarationError;
use thiserror::Error;

use crate::validator::Violation;

/// Errors raised while constructing or running a plugin.
///
/// On the request path these become an ERROR reply; on the auto-dispatch
/// path the job is skipped for that tick.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin rejected its arguments or parameters.
    #[error("plugin '{uid}' failed to initialise: {message}")]
    Init { uid: String, message: String },

    /// The plugin's entry point failed.
    #[error("plugin '{uid}' failed: {message}")]
    Run { uid: String, message: String },

    /// An external plugin's command could not be started.
    #[error("failed to spawn plugin '{uid}' ({command}): {source}")]
    Spawn {
        uid: String,
        command: String,
        #[source]
        source: io::Error,
    },

    /// An external plugin exited unsuccessfully.
    #[error("plugin '{uid}' exited with {status}: {stderr}")]
    Exit {
        uid: String,
        status: String,
        stderr: String,
    },

    /// An external plugin printed something that is not a reply.
    #[error("plugin '{uid}' produced malformed output: {source}")]
    Output {
        uid: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PluginError {
    pub fn init(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Init {
            uid: uid.into(),
            message: message.into(),
        }
    }

    pub fn run(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Run {
            uid: uid.into(),
            message: message.into(),
        }
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors raised by a [`Repository`](crate::repository::Repository).
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A lookup that must succeed found nothing.
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    /// The backing store could not be read or written.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing store holds data that is not a valid declaration.
    #[error("storage is corrupt: {0}")]
    Corrupt(#[from] DeclarationError),

    /// The backing store is unavailable for another reason.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors raised by the [`Router`](crate::router::Router).
#[derive(Debug, Error)]
pub enum RouterError {
    /// The persisted graph did not pass the integrity check.
    #[error("graph failed the integrity check with {} violation(s)", .0.len())]
    IntegrityFailed(Vec<Violation>),

    /// The repository was replaced after the router validated it.
    #[error("graph generation {current} differs from validated generation {validated}")]
    StaleGraph { validated: u64, current: u64 },

    /// A target that passed the integrity check no longer resolves.
    #[error("configuration defect: {0}")]
    ConfigurationDefect(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RouterError {
    pub fn defect(context: impl Into<String>) -> Self {
        Self::ConfigurationDefect(context.into())
    }

    /// The violations that blocked activation, if that is what failed.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::IntegrityFailed(v) => Some(v),
            _ => None,
        }
    }
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
