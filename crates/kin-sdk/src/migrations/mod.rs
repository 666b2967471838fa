//! Memory store database migrations
//!
//! SQL migrations are embedded as strings and executed when a store is
//! opened.

use crate::SdkResult;
use rusqlite::Connection;

/// Memory tables SQL (001): history log and retrieval documents
pub const MEMORY_TABLES_SQL: &str = include_str!("001_memory_tables.sql");

/// Run all memory migrations
pub fn run_migrations(conn: &Connection) -> SdkResult<()> {
    conn.execute_batch(MEMORY_TABLES_SQL)?;
    Ok(())
}
