//! Error types for kin-core.

use thiserror::Error;

/// Result type alias using kin-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for relational persistence and auth
#[derive(Error, Debug)]
pub enum Error {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Companion not found: {0}")]
    CompanionNotFound(String),

    // Auth errors
    #[error("Invalid token")]
    InvalidToken,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check whether this error means the target companion does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CompanionNotFound(_))
    }
}
