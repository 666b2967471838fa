//! Chat turn endpoint.
//!
//! `POST /api/chat/{companionId}` runs one full turn through the pipeline
//! and streams the reply back as server-sent events. Generation itself is
//! a single buffered call, so the stream carries the finished reply in
//! word-sized chunks followed by a terminal `done` event.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Extension, Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use kin_sdk::{Caller, ChatError};

use crate::middleware::AuthContext;
use crate::state::AppState;

/// Create chat router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat/{companion_id}", post(chat_turn))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Map pipeline errors onto HTTP status codes
pub fn error_status(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Unauthorized => StatusCode::UNAUTHORIZED,
        ChatError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Storage(_) | ChatError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run one chat turn and stream the reply
pub async fn chat_turn(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(companion_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ErrorBody>)> {
    let caller = Caller {
        user_id: auth.user_id,
        display_name: auth.display_name,
    };

    let reply = state
        .pipeline
        .run(&caller, &companion_id, &request.prompt, "api")
        .await
        .map_err(|e| {
            let status = error_status(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!(companion_id = %companion_id, error = %e, "chat turn failed");
            }
            (status, Json(ErrorBody {
                error: e.to_string(),
            }))
        })?;

    let stream = async_stream::stream! {
        for chunk in reply.text.split_inclusive(' ') {
            yield Ok(Event::default().data(chunk));
        }
        yield Ok(Event::default().event("done").data(""));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
