//! ============================================================================
//! Client Configuration
//! ============================================================================
//! Env-var backed configuration for the engagement service connection.
//! The CLI loads `.env` via dotenvy before constructing this.
//! ============================================================================

use std::time::Duration;

/// Connection settings for the engagement service
#[derive(Debug, Clone)]
pub struct EngageConfig {
    /// Base URL of the engagement service API, including the `/api` prefix
    pub api_base_url: String,
    /// Per-request timeout applied to every HTTP call
    pub request_timeout: Duration,
    /// Interval between status polls while a link request is in flight
    pub poll_interval: Duration,
    /// Override for the session database path (default: ~/.xengage/engage.redb)
    pub db_path: Option<String>,
}

impl Default for EngageConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("ENGAGE_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000/api".to_string()),
            request_timeout: Duration::from_secs(
                std::env::var("ENGAGE_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            poll_interval: Duration::from_millis(
                std::env::var("ENGAGE_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2000),
            ),
            db_path: std::env::var("ENGAGE_DB_PATH").ok(),
        }
    }
}

impl EngageConfig {
    /// Config pointing at an explicit base URL (used heavily in tests)
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_url_overrides_only_url() {
        let config = EngageConfig::with_base_url("http://example.test/api");
        assert_eq!(config.api_base_url, "http://example.test/api");
        assert!(config.request_timeout >= Duration::from_secs(1));
    }
}
