use thiserror::Error;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, ArkhamError>;

/// Errors raised by the core engine.
#[derive(Debug, Error)]
pub enum ArkhamError {
    /// Caller supplied something the engine cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An action was asked to execute without approval.
    #[error("Action not approved. Status: {0}")]
    NotApproved(String),

    /// The document store has no collection by this name.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// Underlying redb failure.
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    /// Document (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure (log export).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArkhamError {
    /// Convert any redb error type into a storage error.
    pub(crate) fn storage<E: Into<redb::Error>>(err: E) -> Self {
        Self::Storage(err.into())
    }
}
