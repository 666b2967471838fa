//! kin-server - Kinship backend server
//!
//! REST API for companion chat: persona management, per-user conversation
//! memory, background document retrieval and rate-limited chat turns.

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kin_core::{auth::ServiceToken, Database};
use kin_sdk::{
    ChatPipeline, GenerationConfig, HistoryStore, MemoryCounterStore, MemoryOrchestrator,
    OpenAiBackend, RateLimitConfig, RateLimiter, RetrievalIndex, SqliteHistory,
};

#[cfg(not(feature = "embeddings"))]
compile_error!("kin-server requires the embeddings feature");

mod config;
mod middleware;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("kin_server=info".parse()?))
        .init();

    info!("kin-server v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load()?;

    // Relational store: companions and messages.
    let db = Arc::new(Database::open_path(&config.database_path)?);

    // Memory store: conversation log and background documents.
    let memory_conn = Connection::open(&config.memory_database_path)?;
    kin_sdk::migrations::run_migrations(&memory_conn)?;
    let memory_db = Arc::new(Mutex::new(memory_conn));

    let history = Arc::new(SqliteHistory::new(Arc::clone(&memory_db)));

    let embedder = Arc::new(kin_sdk::FastEmbedder::new());
    let retrieval = Arc::new(RetrievalIndex::new(Arc::clone(&memory_db), embedder));
    let orchestrator = MemoryOrchestrator::new(
        Arc::clone(&history) as Arc<dyn HistoryStore>,
        Arc::clone(&retrieval),
    )
    .with_window(config.history_window);

    let limiter = RateLimiter::new(
        Arc::new(MemoryCounterStore::new()),
        RateLimitConfig {
            max_requests: config.rate_limit_max,
            window: config.rate_limit_window,
        },
    );

    let backend = Arc::new(OpenAiBackend::new(GenerationConfig {
        base_url: config.backend_url.clone(),
        model: config.backend_model.clone(),
        api_key: config.backend_api_key.clone(),
        timeout: config.backend_timeout,
        ..GenerationConfig::default()
    })?);
    info!("Generation backend: {} ({})", config.backend_url, config.backend_model);

    let pipeline = ChatPipeline::new(limiter, Arc::clone(&db), orchestrator, backend);

    let service_token = ServiceToken::load_or_generate(&config.service_token_file)?;
    info!("Service token loaded from {:?}", config.service_token_file);

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config, db, memory_db, pipeline, retrieval, service_token);

    let router = routes::create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    Ok(())
}
