//! API configuration
//!
//! Read from `API_`-prefixed environment variables (a `.env` file is loaded
//! first by the server). Unset keys fall back to [`ApiConfig::default`].

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    pub database_url: String,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Shared secret for gateway webhook signatures
    pub webhook_secret: String,
    /// Accepted clock skew between the signature timestamp and now
    pub webhook_tolerance_secs: u64,
    pub gateway_provider: String,
    pub gateway_base_url: String,
    pub gateway_api_key: String,
    /// Base URL of the platform serving itineraries, email and PDF rendering
    pub platform_base_url: String,
    pub platform_api_key: String,
    pub processed_event_retention_days: i64,
    /// Attempts per operation on optimistic-concurrency conflicts
    pub max_concurrency_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/travel".to_string(),
            log_level: "info".to_string(),
            webhook_secret: "whsec_change_me".to_string(),
            webhook_tolerance_secs: 300,
            gateway_provider: "stripe".to_string(),
            gateway_base_url: "https://api.stripe.com".to_string(),
            gateway_api_key: String::new(),
            platform_base_url: "http://localhost:3000/internal".to_string(),
            platform_api_key: String::new(),
            processed_event_retention_days: 30,
            max_concurrency_retries: 3,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Rejects settings the server cannot run with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.webhook_secret.is_empty() {
            return Err(config::ConfigError::Message("API_WEBHOOK_SECRET must be set".into()));
        }
        if self.webhook_tolerance_secs == 0 {
            return Err(config::ConfigError::Message(
                "API_WEBHOOK_TOLERANCE_SECS must be positive".into(),
            ));
        }
        if self.max_concurrency_retries == 0 {
            return Err(config::ConfigError::Message(
                "API_MAX_CONCURRENCY_RETRIES must be at least 1".into(),
            ));
        }
        if self.processed_event_retention_days < 1 {
            return Err(config::ConfigError::Message(
                "API_PROCESSED_EVENT_RETENTION_DAYS must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
