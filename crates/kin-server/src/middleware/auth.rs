//! Authentication middleware for kin-server.
//!
//! The frontend authenticates with the shared service token and forwards
//! the end user's identity in headers. Requests missing either the token
//! or a complete identity never reach a handler.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Authentication context extracted from request headers
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub display_name: String,
}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    MissingIdentity,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, code) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Missing authentication token",
                "MISSING_TOKEN",
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid authentication token",
                "INVALID_TOKEN",
            ),
            AuthError::MissingIdentity => (
                StatusCode::UNAUTHORIZED,
                "Missing user identity headers",
                "MISSING_IDENTITY",
            ),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

/// Authentication middleware for axum
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token_header = request
        .headers()
        .get("X-Kin-Service-Token")
        .or_else(|| request.headers().get("Authorization"));

    let token_str = match token_header {
        Some(value) => value.to_str().map_err(|_| AuthError::InvalidToken)?,
        None => return Err(AuthError::MissingToken),
    };

    // Remove "Bearer " prefix if present
    let token_str = token_str.trim_start_matches("Bearer ").trim();

    let token_bytes = STANDARD
        .decode(token_str)
        .map_err(|_| AuthError::InvalidToken)?;

    if !state.service_token.verify(&token_bytes) {
        return Err(AuthError::InvalidToken);
    }

    // Identity travels in headers alongside the service token. Both parts
    // are required; the pipeline rejects incomplete callers anyway.
    let user_id = header_string(&request, "X-Kin-User-Id").ok_or(AuthError::MissingIdentity)?;
    let display_name =
        header_string(&request, "X-Kin-User-Name").ok_or(AuthError::MissingIdentity)?;

    request.extensions_mut().insert(AuthContext {
        user_id,
        display_name,
    });

    Ok(next.run(request).await)
}

fn header_string(request: &Request<Body>, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
