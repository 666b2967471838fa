//! Kinship SDK - Conversation Memory & Retrieval Orchestrator
//!
//! This crate turns a raw user message into a fully-contextualized prompt,
//! persists and retrieves conversational history, performs semantic
//! retrieval over prior context, and enforces request-rate limits.
//!
//! # Modules
//!
//! - **history** - Append-only, time-ordered conversation log per
//!   `CompanionKey` (sorted-log store semantics)
//! - **retrieval** - Persona-scoped semantic search over background
//!   documents (best-effort, degrades to empty)
//! - **embeddings** - Local vector embeddings via fastembed
//! - **rate_limit** - Per-identifier fixed-window throttle (fail-closed)
//! - **generation** - Seam over the remote text-generation service
//! - **memory** - `MemoryOrchestrator`: composes history + retrieval into
//!   a single build-context operation and owns the seeding policy
//! - **pipeline** - `ChatPipeline`: the end-to-end request state machine
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kin_sdk::{ChatPipeline, Caller};
//!
//! async fn example(pipeline: Arc<ChatPipeline>) -> anyhow::Result<()> {
//!     let caller = Caller {
//!         user_id: "user-123".into(),
//!         display_name: "Grace".into(),
//!     };
//!     let reply = pipeline
//!         .run(&caller, "companion-id", "Hello!", "web")
//!         .await?;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```

pub mod embeddings;
pub mod generation;
pub mod history;
pub mod memory;
pub mod migrations;
pub mod pipeline;
pub mod rate_limit;
pub mod retrieval;

mod error;

// Re-export main SDK types
pub use error::{ChatError, SdkResult};
pub use generation::{GenerationBackend, GenerationConfig, OpenAiBackend};
pub use history::{DEFAULT_HISTORY_WINDOW, HistoryStore, SqliteHistory};
pub use memory::{ConversationContext, MemoryOrchestrator, SEED_DELIMITER};
pub use pipeline::{Caller, ChatPipeline, ChatReply, assemble_prompt};
pub use rate_limit::{CounterStore, MemoryCounterStore, RateLimitConfig, RateLimiter};
pub use retrieval::{DEFAULT_TOP_K, RetrievalIndex, RetrievedDocument};

pub use embeddings::Embedder;
#[cfg(feature = "embeddings")]
pub use embeddings::FastEmbedder;
