//! Runtime configuration
//!
//! Defaults suitable for local development, overridable through `VANTAGE_*`
//! environment variables (e.g. `VANTAGE_BIND_ADDR`, `VANTAGE_DATABASE_URL`,
//! `VANTAGE_SESSION_SECRET`).

use crate::error::Result;
use serde::Deserialize;
use tracing::warn;

/// Default bind address for the HTTP API
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Default local database path
pub const DEFAULT_DATABASE_URL: &str = "vantage.db";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP bind address, `host:port`
    pub bind_addr: String,
    /// Database path, or ":memory:" for an ephemeral database
    pub database_url: String,
    /// Shared secret for session token signatures
    pub session_secret: String,
    /// Session token lifetime in hours
    pub session_ttl_hours: i64,
}

impl AppConfig {
    /// Load configuration from defaults and the environment
    pub fn load() -> Result<Self> {
        let config: AppConfig = config::Config::builder()
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("session_secret", "")?
            .set_default("session_ttl_hours", 24i64)?
            .add_source(config::Environment::with_prefix("VANTAGE"))
            .build()?
            .try_deserialize()
            .map_err(crate::error::VantageError::from)?;

        Ok(config.with_secret_fallback())
    }

    /// Substitute a development secret when none is configured
    fn with_secret_fallback(mut self) -> Self {
        if self.session_secret.is_empty() {
            warn!("Using default session secret. Set VANTAGE_SESSION_SECRET for production.");
            let username = std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "vantage".to_string());
            self.session_secret = format!("vantage-dev-secret-{}", username);
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session_secret: String::new(),
            session_ttl_hours: 24,
        }
        .with_secret_fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.session_ttl_hours, 24);
        assert!(!config.session_secret.is_empty());
    }
}
