/// Configuration management for Vote Service
///
/// Loads configuration from environment variables (and `.env` when present).
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Pair selection and history tuning
    pub vote: VoteConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port
    pub http_port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Ranking engine knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteConfig {
    /// How many unranked/ranked candidates the pair selector samples from
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,
    /// Upper bound for `GET /vote/history?limit=`
    #[serde(default = "default_history_max_limit")]
    pub history_max_limit: i64,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            candidate_pool_size: default_candidate_pool_size(),
            history_max_limit: default_history_max_limit(),
        }
    }
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_candidate_pool_size() -> usize {
    10
}

fn default_history_max_limit() -> i64 {
    100
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_or("PORT", 8090),
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: env_or("DB_MAX_CONNECTIONS", default_max_connections()),
            min_connections: env_or("DB_MIN_CONNECTIONS", default_min_connections()),
        };

        let vote = VoteConfig {
            candidate_pool_size: env_or("VOTE_CANDIDATE_POOL_SIZE", default_candidate_pool_size())
                .max(1),
            history_max_limit: env_or("VOTE_HISTORY_MAX_LIMIT", default_history_max_limit())
                .max(1),
        };

        Ok(Config {
            app,
            database,
            vote,
        })
    }
}
