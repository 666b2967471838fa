//! Chat Pipeline
//!
//! End-to-end handler for one chat turn:
//! rate-check → persist user message → build context → generate →
//! persist reply. Any failure aborts the turn with a [`ChatError`].
//!
//! Ordering bounds partial-failure exposure: the user message is persisted
//! before generation, and the reply is persisted only after generation
//! succeeds. When generation fails, the already-committed user message
//! stays committed; that asymmetry is accepted behavior.

use std::sync::Arc;

use crate::memory::{ConversationContext, MemoryOrchestrator};
use crate::rate_limit::RateLimiter;
use crate::{ChatError, GenerationBackend, SdkResult};
use kin_core::{Companion, CompanionKey, Database, NewMessage, Role};

/// Authenticated caller identity, supplied by the identity provider.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub display_name: String,
}

/// Outcome of a successful turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
}

pub struct ChatPipeline {
    limiter: RateLimiter,
    db: Arc<Database>,
    memory: MemoryOrchestrator,
    backend: Arc<dyn GenerationBackend>,
}

impl ChatPipeline {
    pub fn new(
        limiter: RateLimiter,
        db: Arc<Database>,
        memory: MemoryOrchestrator,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            limiter,
            db,
            memory,
            backend,
        }
    }

    /// Run one chat turn. `origin` is the request origin used to build the
    /// rate-limit identifier together with the user id.
    pub async fn run(
        &self,
        caller: &Caller,
        companion_id: &str,
        prompt: &str,
        origin: &str,
    ) -> SdkResult<ChatReply> {
        if caller.user_id.is_empty() || caller.display_name.is_empty() {
            return Err(ChatError::Unauthorized);
        }

        let identifier = format!("{origin}-{}", caller.user_id);
        if !self.limiter.allow(&identifier).await? {
            return Err(ChatError::RateLimited);
        }

        // Persist the inbound message first; context building must not run
        // against an unpersisted message.
        let companion = self.db.update_companion_with_message(
            companion_id,
            &NewMessage {
                user_id: caller.user_id.clone(),
                role: Role::User,
                content: prompt.to_string(),
            },
        )?;

        let key = CompanionKey::new(
            companion.id.clone(),
            self.backend.model_name(),
            caller.user_id.clone(),
        );
        let scope_tag = format!("{}.txt", companion.id);

        let context = self
            .memory
            .build_context(&key, &format!("User: {prompt}\n"), &companion.seed, &scope_tag)
            .await?;

        let assembled = assemble_prompt(&companion, &context);
        tracing::debug!(companion_id = %companion.id, prompt_chars = assembled.len(), "invoking generation backend");

        let text = self.backend.invoke(&assembled).await?.trim().to_string();
        if text.is_empty() {
            return Err(ChatError::generation("backend returned empty text"));
        }

        // Persist the reply: history first, then the relational record.
        self.memory.record_reply(&key, &text).await?;
        self.db.update_companion_with_message(
            companion_id,
            &NewMessage {
                user_id: caller.user_id.clone(),
                role: Role::Assistant,
                content: text.clone(),
            },
        )?;

        Ok(ChatReply { text })
    }
}

/// Assemble the single prompt string sent to the generation backend.
///
/// Instructs the backend not to prefix its own name, so speaker labels
/// never leak into replies; length is bounded by the backend's token
/// configuration, not by truncating this string.
pub fn assemble_prompt(companion: &Companion, context: &ConversationContext) -> String {
    let relevant: Vec<&str> = context
        .retrieved_docs
        .iter()
        .map(|d| d.content.as_str())
        .collect();

    format!(
        "ONLY generate plain sentences without a prefix of who is speaking. \
         DO NOT use {name}: as a prefix. \
         Limit your answer to a short paragraph of not more than 50 words.\n\n\
         {instructions}\n\n\
         Below are relevant details about {name}'s past and the conversation you are in.\n\
         {relevant}\n\n\
         {recent}\n{name}:",
        name = companion.name,
        instructions = companion.instructions,
        relevant = relevant.join("\n"),
        recent = context.recent_history.join("\n"),
    )
}
