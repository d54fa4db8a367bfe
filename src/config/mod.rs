//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_GEOCODER_BASE_URL: &str = "https://msearch.gsi.go.jp";
const DEFAULT_GEOCODER_TIMEOUT_SECS: u64 = 10;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Postgres connection string
    pub database_url: String,
    /// Expected bearer secret for mutating endpoints
    pub api_token: String,

    /// Base URL of the address-search API
    pub geocoder_base_url: String,
    /// Timeout for a single geocoding request
    pub geocoder_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PaaS providers set PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        };

        let geocoder_timeout_secs = match env::var("GEOCODER_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidTimeout)?,
            Err(_) => DEFAULT_GEOCODER_TIMEOUT_SECS,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            api_token: env::var("API_TOKEN").map_err(|_| ConfigError::Missing("API_TOKEN"))?,

            geocoder_base_url: env::var("GEOCODER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_BASE_URL.to_string()),
            geocoder_timeout: Duration::from_secs(geocoder_timeout_secs),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("GEOCODER_TIMEOUT_SECS must be a whole number of seconds")]
    InvalidTimeout,
}
