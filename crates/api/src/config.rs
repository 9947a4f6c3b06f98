//! Server configuration
//!
//! All settings come from the environment with workable defaults, so a bare
//! `clearcut-api` starts locally without a .env file.

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub bind_address: String,
    /// Free removals per device per UTC day
    pub free_daily_limit: u32,
    pub max_file_size_mb: usize,
    /// Background-removal engine endpoint; empty disables processing
    pub removal_engine_url: String,
    /// Days after a record's reset boundary before the sweeper drops it
    pub usage_record_ttl_days: i64,
    /// Comma-separated CORS origin allowlist
    pub allowed_origins: String,
    /// Shown in 429 responses so exhausted callers know where to upgrade
    pub upgrade_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            app_name: std::env::var("APP_NAME").unwrap_or_else(|_| "Clearcut".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:30066".to_string()),
            free_daily_limit: env_or("FREE_DAILY_LIMIT", 5),
            max_file_size_mb: env_or("MAX_FILE_SIZE_MB", 20),
            removal_engine_url: std::env::var("REMOVAL_ENGINE_URL").unwrap_or_default(),
            usage_record_ttl_days: env_or("USAGE_RECORD_TTL_DAYS", 7),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string()),
            upgrade_url: std::env::var("UPGRADE_URL").unwrap_or_else(|_| "/pricing".to_string()),
        }
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// Upload extensions the remove-bg endpoint accepts
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];
