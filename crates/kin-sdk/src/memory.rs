//! Memory Orchestrator
//!
//! The single place that decides what context accompanies a prompt. It
//! composes the history store and the retrieval index into one
//! `build_context` operation and owns the seeding policy.
//!
//! Explicitly constructed and dependency-injected: created once at process
//! startup, handed to request handlers by reference. Stores are trait
//! objects so tests can substitute their own implementations.

use std::sync::Arc;

use crate::SdkResult;
use crate::history::{DEFAULT_HISTORY_WINDOW, HistoryStore};
use crate::retrieval::{DEFAULT_TOP_K, RetrievalIndex, RetrievedDocument};
use kin_core::CompanionKey;

/// Delimiter between lines in a persona's canned opening material.
pub const SEED_DELIMITER: &str = "\n\n";

/// Ephemeral context for one prompt; recomputed every request.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    /// Recency window, oldest first, already including the caller's own
    /// just-written utterance.
    pub recent_history: Vec<String>,
    /// Best-effort background documents; empty when retrieval is degraded.
    pub retrieved_docs: Vec<RetrievedDocument>,
}

pub struct MemoryOrchestrator {
    history: Arc<dyn HistoryStore>,
    retrieval: Arc<RetrievalIndex>,
    window: usize,
}

impl MemoryOrchestrator {
    pub fn new(history: Arc<dyn HistoryStore>, retrieval: Arc<RetrievalIndex>) -> Self {
        Self {
            history,
            retrieval,
            window: DEFAULT_HISTORY_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Build the context for one turn.
    ///
    /// Seeds the history from `seed_text` when this is the first-ever
    /// conversation for `key`, appends `user_line`, re-reads the recency
    /// window so it includes the caller's own write, then runs a
    /// best-effort similarity search using that window as the query.
    ///
    /// Steps are sequential for this request; concurrent requests for the
    /// same key may interleave appends (append is order-safe), and the
    /// freshness of the re-read is only guaranteed for this request's own
    /// prior write.
    pub async fn build_context(
        &self,
        key: &CompanionKey,
        user_line: &str,
        seed_text: &str,
        scope_tag: &str,
    ) -> SdkResult<ConversationContext> {
        let existing = self.history.read_recent_window(key, self.window).await?;
        if existing.is_empty() {
            tracing::info!(companion_id = %key.companion_id, "seeding first conversation");
            self.history
                .seed_if_empty(key, seed_text, SEED_DELIMITER)
                .await?;
        }

        self.history.append(key, user_line).await?;

        let recent_history = self.history.read_recent_window(key, self.window).await?;
        let retrieved_docs = self
            .retrieval
            .search(&recent_history.join("\n"), scope_tag, DEFAULT_TOP_K)
            .await;

        Ok(ConversationContext {
            recent_history,
            retrieved_docs,
        })
    }

    /// Persist a generated reply into the conversation log, verbatim.
    pub async fn record_reply(&self, key: &CompanionKey, text: &str) -> SdkResult<()> {
        self.history.append(key, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatError;
    use crate::embeddings::Embedder;
    use crate::history::SqliteHistory;
    use async_trait::async_trait;
    use rusqlite::Connection;
    use tokio::sync::Mutex;

    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, text: &str) -> SdkResult<Vec<f32>> {
            let mut vector = vec![0.0f32; 8];
            for token in text.split_whitespace() {
                let bucket = token
                    .bytes()
                    .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                    % 8;
                vector[bucket] += 1.0;
            }
            Ok(vector)
        }
    }

    fn setup() -> (MemoryOrchestrator, Arc<RetrievalIndex>) {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let db = Arc::new(Mutex::new(conn));

        let history = Arc::new(SqliteHistory::new(Arc::clone(&db)));
        let retrieval = Arc::new(RetrievalIndex::new(db, Arc::new(HashEmbedder)));
        (
            MemoryOrchestrator::new(history, Arc::clone(&retrieval)),
            retrieval,
        )
    }

    fn key() -> CompanionKey {
        CompanionKey::new("comp-1", "llama2-13b", "user-1")
    }

    #[tokio::test]
    async fn test_first_conversation_gets_seeded() {
        let (orchestrator, _) = setup();

        let ctx = orchestrator
            .build_context(&key(), "User: Hello\n", "Hi!\n\nHow are you?", "comp-1.txt")
            .await
            .unwrap();

        assert_eq!(
            ctx.recent_history,
            vec!["Hi!", "How are you?", "User: Hello\n"]
        );
    }

    #[tokio::test]
    async fn test_second_turn_does_not_reseed() {
        let (orchestrator, _) = setup();

        orchestrator
            .build_context(&key(), "User: Hello\n", "Hi!\n\nHow are you?", "comp-1.txt")
            .await
            .unwrap();
        let ctx = orchestrator
            .build_context(&key(), "User: Again\n", "Hi!\n\nHow are you?", "comp-1.txt")
            .await
            .unwrap();

        assert_eq!(
            ctx.recent_history,
            vec!["Hi!", "How are you?", "User: Hello\n", "User: Again\n"]
        );
    }

    #[tokio::test]
    async fn test_context_includes_own_write() {
        let (orchestrator, _) = setup();

        let ctx = orchestrator
            .build_context(&key(), "User: Hello\n", "Hi!", "comp-1.txt")
            .await
            .unwrap();
        assert_eq!(
            ctx.recent_history.last().map(String::as_str),
            Some("User: Hello\n")
        );
    }

    #[tokio::test]
    async fn test_retrieval_results_are_scoped() {
        let (orchestrator, retrieval) = setup();
        retrieval
            .add_document("Ada studied under De Morgan", "comp-1.txt")
            .await
            .unwrap();
        retrieval
            .add_document("Byron toured Greece", "comp-2.txt")
            .await
            .unwrap();

        let ctx = orchestrator
            .build_context(&key(), "User: Tell me about Ada\n", "Hi!", "comp-1.txt")
            .await
            .unwrap();

        assert!(!ctx.retrieved_docs.is_empty());
        assert!(ctx.retrieved_docs.iter().all(|d| d.source_tag == "comp-1.txt"));
    }

    #[tokio::test]
    async fn test_window_bound_is_respected() {
        let (orchestrator, _) = setup();
        let orchestrator = orchestrator.with_window(3);

        for i in 0..5 {
            orchestrator
                .build_context(&key(), &format!("User: turn {i}\n"), "Hi!", "comp-1.txt")
                .await
                .unwrap();
        }

        let ctx = orchestrator
            .build_context(&key(), "User: last\n", "Hi!", "comp-1.txt")
            .await
            .unwrap();
        assert_eq!(ctx.recent_history.len(), 3);
        assert_eq!(ctx.recent_history.last().map(String::as_str), Some("User: last\n"));
    }

    /// History failure is fatal for context building (unlike retrieval).
    struct BrokenHistory;

    #[async_trait]
    impl crate::history::HistoryStore for BrokenHistory {
        async fn append(&self, _key: &CompanionKey, _text: &str) -> SdkResult<()> {
            Err(ChatError::storage("history store unreachable"))
        }

        async fn read_recent_window(
            &self,
            _key: &CompanionKey,
            _window: usize,
        ) -> SdkResult<Vec<String>> {
            Err(ChatError::storage("history store unreachable"))
        }

        async fn seed_if_empty(
            &self,
            _key: &CompanionKey,
            _seed_text: &str,
            _delimiter: &str,
        ) -> SdkResult<()> {
            Err(ChatError::storage("history store unreachable"))
        }
    }

    #[tokio::test]
    async fn test_history_failure_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let retrieval = Arc::new(RetrievalIndex::new(
            Arc::new(Mutex::new(conn)),
            Arc::new(HashEmbedder),
        ));
        let orchestrator = MemoryOrchestrator::new(Arc::new(BrokenHistory), retrieval);

        let err = orchestrator
            .build_context(&key(), "User: Hello\n", "Hi!", "comp-1.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Storage(_)));
    }
}
