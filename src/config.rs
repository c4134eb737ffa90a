use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
///
/// Values come from `config/default.toml`, an environment-specific overlay
/// (`config/{RUN_ENV}.toml`) and `APP__`-prefixed environment variables,
/// in that order of precedence.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret used to validate bearer tokens (minimum 32 characters)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Expected `iss` claim on incoming tokens
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// Expected `aud` claim on incoming tokens
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to create missing tables on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Base URL of the storefront frontend; success/cancel redirects for
    /// hosted checkout are derived from it
    pub frontend_url: String,

    /// Payment gateway REST endpoint
    pub payment_gateway_base_url: String,

    /// Payment gateway API secret key
    pub payment_gateway_secret_key: String,

    /// Shared secret for verifying payment webhook signatures
    pub payment_webhook_secret: String,

    /// Webhook timestamp tolerance (seconds); unset disables the check
    #[serde(default)]
    pub payment_webhook_tolerance_secs: Option<u64>,

    /// ISO currency code used for hosted checkout line items
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_auth_issuer() -> String {
    "storefront-auth".to_string()
}
fn default_auth_audience() -> String {
    "storefront-api".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_currency() -> String {
    "inr".to_string()
}
fn default_event_channel_capacity() -> usize {
    1024
}

impl AppConfig {
    /// Creates a configuration programmatically; used by tests and tools
    /// that do not read config files.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            frontend_url: "http://localhost:5173".to_string(),
            payment_gateway_base_url: "https://gateway.invalid".to_string(),
            payment_gateway_secret_key: "sk_test_unset".to_string(),
            payment_webhook_secret: "whsec_test_unset".to_string(),
            payment_webhook_tolerance_secs: None,
            currency: default_currency(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("test")
    }
}

/// Loads configuration from files and environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret, payment_gateway_secret_key and payment_webhook_secret have
    // no defaults - they MUST come from a config file or environment variable.
    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("frontend_url", "http://localhost:5173")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config
        .validate()
        .map_err(|e| ConfigError::Message(format!("Invalid configuration: {}", e)))?;

    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(filter_directive)
            .json()
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmatic_config_validates() {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "a_sufficiently_long_secret_for_tests_0123456789".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        assert!(cfg.validate().is_ok());
        assert!(cfg.is_development());
        assert_eq!(cfg.currency, "inr");
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "short".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        assert!(cfg.validate().is_err());
    }
}
