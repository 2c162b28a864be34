//! Error types for Afinar

use crate::reasoning::CapabilityError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Reasoning capability failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Applying feedback to {node} failed: {reason}")]
    Application { node: String, reason: String },

    #[error("Cycle detected in predecessor edges at {0}")]
    Traversal(String),

    #[error("Cannot resume {0}: an earlier resumption failed")]
    SuspensionPoisoned(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build an application error for the named node
    pub fn application(node: impl Into<String>, reason: impl ToString) -> Self {
        Self::Application {
            node: node.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
