//! Retrieval Index
//!
//! Semantic nearest-neighbor search over persona-scoped background
//! documents. Retrieval is a best-effort enrichment: every failure path in
//! [`RetrievalIndex::search`] degrades to an empty result with a diagnostic,
//! never an error, so the chat pipeline keeps going without it.

use std::sync::Arc;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::SdkResult;
use crate::embeddings::{Embedder, cosine_similarity};

/// Default number of documents returned per search.
pub const DEFAULT_TOP_K: usize = 3;

/// An opaque chunk of persona-background text, tagged with the persona's
/// document identifier. Never mutated by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub source_tag: String,
}

/// Vector index over persona background documents.
pub struct RetrievalIndex {
    db: Arc<Mutex<Connection>>,
    embedder: Arc<dyn Embedder>,
}

impl RetrievalIndex {
    pub fn new(db: Arc<Mutex<Connection>>, embedder: Arc<dyn Embedder>) -> Self {
        Self { db, embedder }
    }

    /// Embed and store one background document under `source_tag`.
    pub async fn add_document(&self, content: &str, source_tag: &str) -> SdkResult<String> {
        let vector = self.embedder.embed(content).await?;
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO retrieval_documents (id, source_tag, content, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &id,
                source_tag,
                content,
                serde_json::to_string(&vector)?,
                now,
            ],
        )?;
        Ok(id)
    }

    /// Similarity search scoped to documents tagged `scope_tag`, returning
    /// at most `top_k` documents ordered by descending similarity.
    ///
    /// Best-effort: on any failure this logs and returns an empty sequence.
    pub async fn search(
        &self,
        query_text: &str,
        scope_tag: &str,
        top_k: usize,
    ) -> Vec<RetrievedDocument> {
        match self.try_search(query_text, scope_tag, top_k).await {
            Ok(docs) => docs,
            Err(err) => {
                tracing::warn!(scope_tag, error = %err, "vector search failed, continuing without retrieval");
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        query_text: &str,
        scope_tag: &str,
        top_k: usize,
    ) -> SdkResult<Vec<RetrievedDocument>> {
        let query_vector = self.embedder.embed(query_text).await?;

        // Scoping happens in SQL, so cross-persona leakage is impossible
        // regardless of similarity scores.
        let candidates: Vec<(String, String)> = {
            let db = self.db.lock().await;
            let mut stmt = db.prepare(
                "SELECT content, embedding FROM retrieval_documents WHERE source_tag = ?1",
            )?;
            let rows = stmt.query_map(params![scope_tag], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut scored: Vec<(f32, RetrievedDocument)> = Vec::with_capacity(candidates.len());
        for (content, embedding_json) in candidates {
            let vector: Vec<f32> = serde_json::from_str(&embedding_json)?;
            let score = cosine_similarity(&query_vector, &vector);
            scored.push((
                score,
                RetrievedDocument {
                    content,
                    source_tag: scope_tag.to_string(),
                },
            ));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored.into_iter().map(|(_, doc)| doc).collect())
    }
}
