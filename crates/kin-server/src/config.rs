//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to
    pub bind_addr: String,
    /// Relational database path (companions and messages)
    pub database_path: PathBuf,
    /// Memory database path (conversation log and background documents)
    pub memory_database_path: PathBuf,
    /// Service token file path
    pub service_token_file: PathBuf,
    /// Generation backend base URL
    pub backend_url: String,
    /// Generation model name
    pub backend_model: String,
    /// Optional API key for the generation backend
    pub backend_api_key: Option<String>,
    /// Per-request generation timeout
    pub backend_timeout: Duration,
    /// Maximum chat turns per identifier per window
    pub rate_limit_max: u32,
    /// Rate limit window length
    pub rate_limit_window: Duration,
    /// Recency window size for prompt context
    pub history_window: usize,
}

impl Config {
    /// Load configuration from the environment or defaults
    ///
    /// Standard directory structure:
    /// ```text
    /// ~/.kinship/
    /// ├── sqlite.db             # Companions and messages
    /// ├── memory.db             # Conversation log and documents
    /// └── server/
    ///     └── service-token     # Token for the frontend → kin-server
    /// ```
    pub fn load() -> anyhow::Result<Self> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        // Use KIN_DIR env var if set, otherwise ~/.kinship
        let kin_dir = std::env::var("KIN_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".kinship"));

        let server_dir = kin_dir.join("server");
        std::fs::create_dir_all(&server_dir)?;

        let rate_limit_max = env_parse("KIN_RATE_LIMIT_MAX", 10)?;
        let rate_limit_window_secs: u64 = env_parse("KIN_RATE_LIMIT_WINDOW_SECS", 10)?;
        let backend_timeout_secs: u64 = env_parse("KIN_BACKEND_TIMEOUT_SECS", 60)?;
        let history_window = env_parse("KIN_HISTORY_WINDOW", 30)?;

        Ok(Self {
            bind_addr: std::env::var("KIN_BIND").unwrap_or_else(|_| "127.0.0.1:8700".to_string()),
            database_path: kin_dir.join("sqlite.db"),
            memory_database_path: kin_dir.join("memory.db"),
            service_token_file: server_dir.join("service-token"),
            backend_url: std::env::var("KIN_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            backend_model: std::env::var("KIN_MODEL")
                .unwrap_or_else(|_| "llama2-13b".to_string()),
            backend_api_key: std::env::var("KIN_API_KEY").ok(),
            backend_timeout: Duration::from_secs(backend_timeout_secs),
            rate_limit_max,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            history_window,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {name}: {e}")),
        Err(_) => Ok(default),
    }
}
