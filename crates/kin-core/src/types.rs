//! Shared types for kin-core.
//!
//! These types are used by both the memory/retrieval SDK and the HTTP server.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

/// A companion persona a user converses with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Companion {
    pub id: String,
    /// Display name, used as the turn marker in assembled prompts.
    pub name: String,
    /// System instructions describing the persona.
    pub instructions: String,
    /// Canned opening conversation, split on a delimiter when seeding history.
    pub seed: String,
    pub created_at: i64,
}

/// A persisted chat message belonging to a companion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub companion_id: String,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Types (for creating entities)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewCompanion {
    pub name: String,
    pub instructions: String,
    pub seed: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub user_id: String,
    pub role: Role,
    pub content: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// CompanionKey
// ─────────────────────────────────────────────────────────────────────────────

/// Composite identity scoping one conversation's memory:
/// one persona, one model variant, one user.
///
/// Immutable; used only as a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanionKey {
    pub companion_id: String,
    pub model_name: String,
    pub user_id: String,
}

impl CompanionKey {
    pub fn new(
        companion_id: impl Into<String>,
        model_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            companion_id: companion_id.into(),
            model_name: model_name.into(),
            user_id: user_id.into(),
        }
    }

    /// Deterministic string form used to address the history store.
    ///
    /// Components are escaped before joining so that no two distinct
    /// triples collapse to the same key, even when ids contain `:`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}",
            escape(&self.companion_id),
            escape(&self.model_name),
            escape(&self.user_id)
        )
    }
}

fn escape(part: &str) -> String {
    part.replace('\\', "\\\\").replace(':', "\\:")
}
