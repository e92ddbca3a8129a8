use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Address the HTTP surface binds to.
    pub bind_addr: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Base URL of the remote face service.
    pub api_base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Minimum confidence for a comparison to count as a match.
    pub match_threshold: f64,
    /// Maximum candidates compared per matching run.
    pub candidate_cap: usize,
    /// Minimum spacing between remote face service calls.
    pub rate_limit: Duration,
    /// Timeout for each remote face service call.
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from `FACEFIND_*` environment variables with
    /// defaults. The rate-limit default of 1100 ms matches the spacing
    /// the reference service tolerates without rejecting bursts.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facefind");

        let db_path = std::env::var("FACEFIND_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("facefind.db"));

        Self {
            bind_addr: std::env::var("FACEFIND_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8420".to_string()),
            db_path,
            api_base_url: std::env::var("FACEFIND_API_BASE_URL")
                .unwrap_or_else(|_| "https://api-us.faceplusplus.com/facepp/v3".to_string()),
            api_key: std::env::var("FACEFIND_API_KEY").unwrap_or_default(),
            api_secret: std::env::var("FACEFIND_API_SECRET").unwrap_or_default(),
            match_threshold: env_f64("FACEFIND_MATCH_THRESHOLD", 60.0),
            candidate_cap: env_usize("FACEFIND_CANDIDATE_CAP", 100),
            rate_limit: Duration::from_millis(env_u64("FACEFIND_RATE_LIMIT_MS", 1100)),
            http_timeout: Duration::from_secs(env_u64("FACEFIND_HTTP_TIMEOUT_SECS", 30)),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
