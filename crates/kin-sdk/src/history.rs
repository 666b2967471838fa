//! Conversation History Store
//!
//! An append-only, time-ordered log of utterances per [`CompanionKey`].
//! Entries are never edited or deleted; reading the latest window is a
//! pure, size-bounded projection over the full log.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, params};
use tokio::sync::Mutex;

use crate::{ChatError, SdkResult};
use kin_core::CompanionKey;

/// Default size of the recency window read for prompting.
pub const DEFAULT_HISTORY_WINDOW: usize = 30;

/// Store interface for the conversation log.
///
/// Implementations must make `append` atomic at the store level (single
/// add-with-score, no read-modify-write) so concurrent appends for the same
/// key all land individually.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one entry scored with the current wall-clock time.
    async fn append(&self, key: &CompanionKey, text: &str) -> SdkResult<()>;

    /// Read the full ordered log, keep the most recent `window` entries, and
    /// return them oldest-first. An empty log yields an empty sequence.
    async fn read_recent_window(
        &self,
        key: &CompanionKey,
        window: usize,
    ) -> SdkResult<Vec<String>>;

    /// Split `seed_text` on `delimiter` and write each line with its list
    /// position as score, but only when no entry exists for `key` yet.
    ///
    /// The existence check is a best-effort guard, not a transaction: two
    /// racing first writers can both seed, leaving duplicated seed lines.
    /// That outcome is rare and non-corrupting, and is tolerated.
    async fn seed_if_empty(
        &self,
        key: &CompanionKey,
        seed_text: &str,
        delimiter: &str,
    ) -> SdkResult<()>;
}

/// SQLite-backed history store.
///
/// The sorted-log primitives (add member with score, range by score, exists)
/// each run as a single statement under the connection lock.
pub struct SqliteHistory {
    db: Arc<Mutex<Connection>>,
}

impl SqliteHistory {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    async fn exists(&self, storage_key: &str) -> SdkResult<bool> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM history_entries WHERE key = ?1",
            params![storage_key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    async fn append(&self, key: &CompanionKey, text: &str) -> SdkResult<()> {
        if key.user_id.is_empty() {
            return Err(ChatError::storage("companion key has no user id"));
        }

        let storage_key = key.storage_key();
        let score = chrono::Utc::now().timestamp_millis();

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO history_entries (key, score, member) VALUES (?1, ?2, ?3)",
            params![&storage_key, score, text],
        )?;
        Ok(())
    }

    async fn read_recent_window(
        &self,
        key: &CompanionKey,
        window: usize,
    ) -> SdkResult<Vec<String>> {
        let storage_key = key.storage_key();

        let db = self.db.lock().await;
        // Most recent `window` entries, then flipped back to chronological
        // order. Truncation drops only the oldest; it never reorders.
        let mut stmt = db.prepare(
            "SELECT member FROM history_entries
             WHERE key = ?1
             ORDER BY score DESC, id DESC
             LIMIT ?2",
        )?;
        let mut entries = stmt
            .query_map(params![&storage_key, window as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        entries.reverse();
        Ok(entries)
    }

    async fn seed_if_empty(
        &self,
        key: &CompanionKey,
        seed_text: &str,
        delimiter: &str,
    ) -> SdkResult<()> {
        let storage_key = key.storage_key();

        if self.exists(&storage_key).await? {
            tracing::debug!(key = %storage_key, "history already seeded");
            return Ok(());
        }

        let db = self.db.lock().await;
        for (index, line) in seed_text.split(delimiter).enumerate() {
            db.execute(
                "INSERT INTO history_entries (key, score, member) VALUES (?1, ?2, ?3)",
                params![&storage_key, index as i64, line],
            )?;
        }
        Ok(())
    }
}
