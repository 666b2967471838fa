//! SDK Error Types
//!
//! Defines the failure taxonomy for a chat turn. Each variant maps to a
//! distinct caller-visible status:
//!
//! - `Unauthorized`, `RateLimited`, `NotFound` are terminal and reported
//!   verbatim, with no retry.
//! - `Storage` during rate-check or user-message persistence is terminal
//!   for the turn (fail fast, no partial side effects). Storage failures
//!   inside best-effort retrieval never surface here; retrieval degrades
//!   to an empty result instead.
//! - `Generation` is terminal for the turn, but the user message persisted
//!   before generation stays committed (documented asymmetry).

use thiserror::Error;

/// SDK Result type alias
pub type SdkResult<T> = Result<T, ChatError>;

/// Failure taxonomy for the chat pipeline
#[derive(Debug, Error)]
pub enum ChatError {
    /// No usable caller identity
    #[error("unauthorized")]
    Unauthorized,

    /// The rate limiter rejected this identifier
    #[error("rate limit exceeded")]
    RateLimited,

    /// Companion absent in the relational store
    #[error("companion not found: {0}")]
    NotFound(String),

    /// History, relational, or counter store unreachable or errored
    #[error("storage error: {0}")]
    Storage(String),

    /// Backend call failed, timed out, or returned empty text
    #[error("generation error: {0}")]
    Generation(String),
}

impl ChatError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<rusqlite::Error> for ChatError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<kin_core::Error> for ChatError {
    fn from(err: kin_core::Error) -> Self {
        match err {
            kin_core::Error::CompanionNotFound(id) => Self::NotFound(id),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("serialization: {}", err))
    }
}
