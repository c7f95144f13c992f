use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // SQLite
    pub database_url: String,
    pub db_max_connections: u32,

    // Playlist fetch
    pub user_agent: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub max_retries: u32,
    pub max_m3u_size_mb: usize,
    pub credentials_in_query: bool,

    // Browsing
    pub recent_limit: i64,

    // Playback
    pub player_command: String,
    pub player_args: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // SQLite
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://xcloud_tv.db".to_string()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Playlist fetch
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "Xcloud TV 2025/1.0".to_string()),

            connect_timeout_ms: env::var("CONNECT_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30_000), // 30 seconds

            read_timeout_ms: env::var("READ_TIMEOUT_MS")
                .unwrap_or_else(|_| "60000".to_string())
                .parse()
                .unwrap_or(60_000), // 60 seconds

            max_retries: env::var("MAX_RETRIES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),

            max_m3u_size_mb: env::var("MAX_M3U_SIZE_MB")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),

            credentials_in_query: env::var("CREDENTIALS_IN_QUERY")
                .map(|v| parse_bool(&v).unwrap_or(true))
                .unwrap_or(true),

            // Browsing
            recent_limit: env::var("RECENT_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Playback
            player_command: env::var("PLAYER_COMMAND").unwrap_or_else(|_| "mpv".to_string()),
            player_args: env::var("PLAYER_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for tests (ignores the environment)
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            user_agent: "Xcloud TV 2025/1.0".to_string(),
            connect_timeout_ms: 2_000,
            read_timeout_ms: 5_000,
            max_retries: 2,
            max_m3u_size_mb: 1,
            credentials_in_query: true,
            recent_limit: 10,
            player_command: "true".to_string(),
            player_args: Vec::new(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
