//! kin-core - Core library for Kinship
//!
//! This crate provides functionality shared between the memory SDK and the
//! HTTP server:
//!
//! - **db**: Direct SQLite access to companions and their message log
//! - **types**: Shared entities (`Companion`, `Message`, `CompanionKey`)
//! - **auth**: Service-token authentication
//! - **error**: Core error types

pub mod auth;
pub mod db;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use types::{Companion, CompanionKey, Message, NewCompanion, NewMessage, Role};
