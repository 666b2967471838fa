//! API route modules.

pub mod chat;
pub mod companions;
pub mod health;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health::health_check));

    // Protected routes (require auth)
    let protected_routes = Router::new()
        .merge(chat::router())
        .merge(companions::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .nest("/api", protected_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use rusqlite::Connection;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use kin_core::{auth::ServiceToken, Database, NewCompanion};
    use kin_sdk::{
        ChatPipeline, Embedder, GenerationBackend, HistoryStore, MemoryCounterStore,
        MemoryOrchestrator, RateLimitConfig, RateLimiter, RetrievalIndex, SdkResult,
        SqliteHistory,
    };

    use crate::config::Config;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> SdkResult<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    struct StubBackend;

    #[async_trait]
    impl GenerationBackend for StubBackend {
        async fn invoke(&self, _prompt: &str) -> SdkResult<String> {
            Ok("Hello from Ada".to_string())
        }

        fn model_name(&self) -> &str {
            "test-model"
        }
    }

    struct TestApp {
        router: Router,
        token: String,
        db: Arc<Database>,
    }

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            database_path: dir.join("sqlite.db"),
            memory_database_path: dir.join("memory.db"),
            service_token_file: dir.join("service-token"),
            backend_url: "http://127.0.0.1:1".to_string(),
            backend_model: "test-model".to_string(),
            backend_api_key: None,
            backend_timeout: Duration::from_secs(1),
            rate_limit_max: 3,
            rate_limit_window: Duration::from_secs(60),
            history_window: 30,
        }
    }

    fn make_app(dir: &std::path::Path) -> TestApp {
        let conn = Connection::open_in_memory().unwrap();
        kin_sdk::migrations::run_migrations(&conn).unwrap();
        let memory_db = Arc::new(Mutex::new(conn));

        let history = Arc::new(SqliteHistory::new(Arc::clone(&memory_db)));
        let retrieval = Arc::new(RetrievalIndex::new(
            Arc::clone(&memory_db),
            Arc::new(StubEmbedder),
        ));
        let orchestrator = MemoryOrchestrator::new(
            Arc::clone(&history) as Arc<dyn HistoryStore>,
            Arc::clone(&retrieval),
        );

        let db = Arc::new(Database::open_in_memory().unwrap());
        let config = test_config(dir);
        let limiter = RateLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            RateLimitConfig {
                max_requests: config.rate_limit_max,
                window: config.rate_limit_window,
            },
        );
        let pipeline = ChatPipeline::new(limiter, Arc::clone(&db), orchestrator, Arc::new(StubBackend));

        let service_token = ServiceToken::generate();
        let token = STANDARD.encode(service_token.token);

        let state = AppState::new(
            config,
            Arc::clone(&db),
            memory_db,
            pipeline,
            retrieval,
            service_token,
        );
        TestApp {
            router: create_router(state),
            token,
            db,
        }
    }

    fn authed(request: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
        request
            .header("X-Kin-Service-Token", token)
            .header("X-Kin-User-Id", "user-1")
            .header("X-Kin-User-Name", "Grace")
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn seed_companion(db: &Database) -> String {
        db.create_companion(&NewCompanion {
            name: "Ada".into(),
            instructions: "You are Ada.".into(),
            seed: "Hi!\n\nHow are you?".into(),
        })
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path());

        let resp = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        assert!(body.contains("\"status\":\"healthy\""));
    }

    #[tokio::test]
    async fn test_protected_route_rejects_missing_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path());
        let companion_id = seed_companion(&app.db);

        let resp = app
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/chat/{companion_id}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt":"Hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_route_rejects_bad_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path());
        let bogus = STANDARD.encode([7u8; 32]);

        let resp = app
            .router
            .oneshot(
                authed(
                    Request::builder().method("POST").uri("/api/companions"),
                    &bogus,
                )
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"name":"Ada","instructions":"x","seed":"Hi!"}"#,
                ))
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_chat_turn_streams_reply() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path());
        let companion_id = seed_companion(&app.db);

        let resp = app
            .router
            .oneshot(
                authed(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/api/chat/{companion_id}")),
                    &app.token,
                )
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"Hello"}"#))
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        assert!(body.contains("Hello"));
        assert!(body.contains("event: done"));
    }

    #[tokio::test]
    async fn test_chat_unknown_companion_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path());

        let resp = app
            .router
            .oneshot(
                authed(
                    Request::builder().method("POST").uri("/api/chat/missing"),
                    &app.token,
                )
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"Hello"}"#))
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_rate_limit_returns_429() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path());
        let companion_id = seed_companion(&app.db);

        let mut last_status = StatusCode::OK;
        for _ in 0..4 {
            let resp = app
                .router
                .clone()
                .oneshot(
                    authed(
                        Request::builder()
                            .method("POST")
                            .uri(format!("/api/chat/{companion_id}")),
                        &app.token,
                    )
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt":"Hello"}"#))
                    .unwrap(),
                )
                .await
                .unwrap();
            last_status = resp.status();
        }

        assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_create_companion_and_list_messages() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path());

        let resp = app
            .router
            .clone()
            .oneshot(
                authed(
                    Request::builder().method("POST").uri("/api/companions"),
                    &app.token,
                )
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"name":"Ada","instructions":"You are Ada.","seed":"Hi!"}"#,
                ))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        let companion_id = created["id"].as_str().unwrap().to_string();

        // One chat turn, then the transcript holds both sides.
        let resp = app
            .router
            .clone()
            .oneshot(
                authed(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/api/chat/{companion_id}")),
                    &app.token,
                )
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"Hello"}"#))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .router
            .oneshot(
                authed(
                    Request::builder()
                        .uri(format!("/api/companions/{companion_id}/messages")),
                    &app.token,
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let listed: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(listed["total"], 2);
        assert_eq!(listed["messages"][0]["role"], "user");
        assert_eq!(listed["messages"][1]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_add_document() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_app(dir.path());
        let companion_id = seed_companion(&app.db);

        let resp = app
            .router
            .oneshot(
                authed(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/api/companions/{companion_id}/documents")),
                    &app.token,
                )
                .header("content-type", "application/json")
                .body(Body::from(r#"{"content":"Ada studied under De Morgan"}"#))
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(
            body["sourceTag"].as_str().unwrap(),
            format!("{companion_id}.txt")
        );
    }
}
