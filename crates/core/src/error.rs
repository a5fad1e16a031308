//! Error types for the pagestitch merge engine.

use thiserror::Error;

/// Primary error type for table merge operations.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("malformed fragment {id}: {reason}")]
    MalformedFragment { id: String, reason: String },

    #[error("chain references unknown fragment: {0}")]
    UnresolvedChainReference(String),

    #[error("chain must contain at least 2 fragments, got {0}")]
    ChainTooShort(usize),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias for MergeError.
pub type Result<T> = std::result::Result<T, MergeError>;
