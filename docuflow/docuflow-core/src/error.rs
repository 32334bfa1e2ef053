//! Error types shared by the store, the gateways and the client session.

use thiserror::Error;
use uuid::Uuid;

/// Every failure a tree operation or a gateway call can report.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed create/update/move input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation targets an id that does not exist.
    #[error("node not found: {0}")]
    NotFound(Uuid),

    /// The stored tree is malformed (cycle or dangling parent).
    #[error("tree consistency violated: {0}")]
    Consistency(String),

    /// A gateway call did not complete or returned something unusable.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A cascade delete stopped partway through.
    #[error("cascade delete stopped after {} of {} nodes", deleted.len(), deleted.len() + remaining.len())]
    PartialFailure {
        deleted: Vec<Uuid>,
        remaining: Vec<Uuid>,
    },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
