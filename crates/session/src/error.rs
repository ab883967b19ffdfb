//! Session error types

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The presentation layer and the session disagree about what exists.
    /// Always a programming error upstream.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error(transparent)]
    Tree(#[from] canopy_core::Error),

    #[error("state store error: {0}")]
    Store(#[from] sled::Error),

    #[error("state encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("invalid session configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Whether the error indicates a caller defect rather than an
    /// environmental failure
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            SessionError::ConsistencyViolation(_)
                | SessionError::Tree(canopy_core::Error::InvalidPath { .. })
        )
    }
}
