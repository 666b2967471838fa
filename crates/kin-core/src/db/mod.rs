//! Direct SQLite access for the relational persistence store.
//!
//! Holds companions and their message log. The conversation memory core
//! only touches this store through [`Database::update_companion_with_message`];
//! everything else is glue for creating personas and rendering transcripts.

use crate::error::{Error, Result};
use crate::types::{Companion, Message, NewCompanion, NewMessage, Role};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// Companion and message tables SQL
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open database at a specific path and run migrations
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::Database)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch("SELECT 1").map_err(Error::Database)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Companion Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a companion persona
    pub fn create_companion(&self, input: &NewCompanion) -> Result<Companion> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO companions (id, name, instructions, seed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&id, &input.name, &input.instructions, &input.seed, now],
        )?;

        Ok(Companion {
            id,
            name: input.name.clone(),
            instructions: input.instructions.clone(),
            seed: input.seed.clone(),
            created_at: now,
        })
    }

    /// Get companion by ID
    pub fn get_companion(&self, companion_id: &str) -> Result<Option<Companion>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, name, instructions, seed, created_at
             FROM companions WHERE id = ?1",
        )?;

        Ok(stmt
            .query_row(params![companion_id], Self::map_companion)
            .optional()?)
    }

    /// Append a message to a companion's relational record and return the
    /// companion, erroring with [`Error::CompanionNotFound`] if it does not
    /// exist. Called twice per chat turn: once for the user message, once
    /// for the generated reply.
    pub fn update_companion_with_message(
        &self,
        companion_id: &str,
        message: &NewMessage,
    ) -> Result<Companion> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;

        let companion = conn
            .prepare(
                "SELECT id, name, instructions, seed, created_at
                 FROM companions WHERE id = ?1",
            )?
            .query_row(params![companion_id], Self::map_companion)
            .optional()?
            .ok_or_else(|| Error::CompanionNotFound(companion_id.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO messages (id, companion_id, user_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &id,
                companion_id,
                &message.user_id,
                message.role.as_str(),
                &message.content,
                now,
            ],
        )?;

        Ok(companion)
    }

    /// List the most recent messages for a (companion, user) pair,
    /// oldest first.
    pub fn list_recent_messages(
        &self,
        companion_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, companion_id, user_id, role, content, created_at
             FROM messages
             WHERE companion_id = ?1 AND user_id = ?2
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3",
        )?;

        let mut messages = stmt
            .query_map(params![companion_id, user_id, limit as i64], |row| {
                let role_str: String = row.get(3)?;
                Ok(Message {
                    id: row.get(0)?,
                    companion_id: row.get(1)?,
                    user_id: row.get(2)?,
                    role: Role::from_str(&role_str).unwrap_or(Role::User),
                    content: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        messages.reverse();
        Ok(messages)
    }

    fn map_companion(row: &rusqlite::Row) -> rusqlite::Result<Companion> {
        Ok(Companion {
            id: row.get(0)?,
            name: row.get(1)?,
            instructions: row.get(2)?,
            seed: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
