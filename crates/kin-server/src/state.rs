//! Application state.

use std::sync::Arc;
use std::time::Instant;

use rusqlite::Connection;
use tokio::sync::Mutex;

use kin_core::{auth::ServiceToken, Database};
use kin_sdk::{ChatPipeline, RetrievalIndex};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Relational database (companions and messages)
    pub db: Arc<Database>,
    /// Memory database connection, shared with the history store and index
    pub memory_db: Arc<Mutex<Connection>>,
    /// Chat turn pipeline
    pub pipeline: Arc<ChatPipeline>,
    /// Background document index, exposed for ingestion routes
    pub retrieval: Arc<RetrievalIndex>,
    /// Service token for frontend authentication
    pub service_token: Arc<ServiceToken>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<Database>,
        memory_db: Arc<Mutex<Connection>>,
        pipeline: ChatPipeline,
        retrieval: Arc<RetrievalIndex>,
        service_token: ServiceToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            db,
            memory_db,
            pipeline: Arc::new(pipeline),
            retrieval,
            service_token: Arc::new(service_token),
            start_time: Instant::now(),
        })
    }
}
