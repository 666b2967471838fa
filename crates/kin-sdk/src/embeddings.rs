//! Embedding Service for Semantic Retrieval
//!
//! Provides local vector embeddings using `fastembed` for grounding
//! prompts in persona background documents. Uses the all-MiniLM-L6-v2
//! model (384 dimensions), loaded lazily on first use.

use async_trait::async_trait;

use crate::{ChatError, SdkResult};

/// Embedding dimensions for all-MiniLM-L6-v2
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Seam over the embedding model, so the retrieval index can run against a
/// deterministic test embedder.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for a single text
    async fn embed(&self, text: &str) -> SdkResult<Vec<f32>>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value between -1.0 and 1.0, where 1.0 means identical,
/// 0.0 means orthogonal, and -1.0 means opposite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Normalize cosine similarity (-1 to 1) to a relevance score (0 to 1)
pub fn normalize_similarity(similarity: f32) -> f32 {
    (similarity + 1.0) / 2.0
}

/// fastembed-backed embedder with lazy model loading
#[cfg(feature = "embeddings")]
pub struct FastEmbedder {
    model: std::sync::Arc<tokio::sync::RwLock<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "embeddings")]
impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embeddings")]
impl FastEmbedder {
    pub fn new() -> Self {
        Self {
            model: std::sync::Arc::new(tokio::sync::RwLock::new(None)),
        }
    }

    /// Initialize the embedding model (lazy loading)
    async fn ensure_model(&self) -> SdkResult<()> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model_guard = self.model.read().await;
        if model_guard.is_some() {
            return Ok(());
        }
        drop(model_guard);

        let mut model_guard = self.model.write().await;
        if model_guard.is_some() {
            return Ok(());
        }

        tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
        let start = std::time::Instant::now();

        let init_options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| ChatError::storage(format!("Failed to load embedding model: {}", e)))?;

        tracing::info!("Embedding model loaded in {:?}", start.elapsed());

        *model_guard = Some(model);
        Ok(())
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> SdkResult<Vec<f32>> {
        self.ensure_model().await?;

        let model_guard = self.model.read().await;
        let model = model_guard
            .as_ref()
            .ok_or_else(|| ChatError::storage("Embedding model not initialized"))?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| ChatError::storage(format!("Failed to generate embedding: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::storage("No embedding generated"))
    }
}
