//! Companion management routes.
//!
//! - `POST /companions` - create a persona
//! - `GET /companions/{id}/messages` - the caller's transcript with a persona
//! - `POST /companions/{id}/documents` - ingest background material

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use kin_core::{Companion, Message, NewCompanion};

use crate::middleware::AuthContext;
use crate::state::AppState;

const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Create companions router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/companions", post(create_companion))
        .route("/companions/{id}/messages", get(list_messages))
        .route("/companions/{id}/documents", post(add_document))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDocumentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDocumentResponse {
    pub id: String,
    pub source_tag: String,
}

/// Create a new companion persona
pub async fn create_companion(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewCompanion>,
) -> Result<(StatusCode, Json<Companion>), (StatusCode, String)> {
    if input.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name must not be empty".into()));
    }

    let companion = state
        .db
        .create_companion(&input)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((StatusCode::CREATED, Json(companion)))
}

/// List the caller's recent messages with a companion, oldest first
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(companion_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<MessagesResponse>, (StatusCode, String)> {
    if state
        .db
        .get_companion(&companion_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "companion not found".into()));
    }

    let limit = query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT);
    let messages = state
        .db
        .list_recent_messages(&companion_id, &auth.user_id, limit)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let total = messages.len();
    Ok(Json(MessagesResponse { messages, total }))
}

/// Embed and index a background document for a companion
pub async fn add_document(
    State(state): State<Arc<AppState>>,
    Path(companion_id): Path<String>,
    Json(request): Json<AddDocumentRequest>,
) -> Result<(StatusCode, Json<AddDocumentResponse>), (StatusCode, String)> {
    if state
        .db
        .get_companion(&companion_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "companion not found".into()));
    }

    if request.content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "content must not be empty".into()));
    }

    // Same tag scheme the chat pipeline queries with.
    let source_tag = format!("{companion_id}.txt");
    let id = state
        .retrieval
        .add_document(&request.content, &source_tag)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((StatusCode::CREATED, Json(AddDocumentResponse { id, source_tag })))
}
