use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_ROUTING_BASE_URL: &str = "https://api.mapbox.com/directions/v5/mapbox";
const DEFAULT_ROUTING_TIMEOUT_SECS: u64 = 5;
const DEFAULT_RIDER_INTEREST_EXPIRY_MINUTES: i64 = 30;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port (1024-65535)
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

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Database pool tuning
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Base URL of the external routing (directions) provider
    #[serde(default = "default_routing_base_url")]
    pub routing_base_url: String,

    /// Access token for the routing provider; routing degrades to
    /// distance-unknown when unset
    #[serde(default)]
    pub routing_access_token: Option<String>,

    /// Upper bound on a single routing call
    #[serde(default = "default_routing_timeout_secs")]
    pub routing_timeout_secs: u64,

    /// Fallback expiry applied to rider interest bids without an ETA
    #[serde(default = "default_rider_interest_expiry_minutes")]
    pub rider_interest_default_expiry_minutes: i64,
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

fn default_routing_base_url() -> String {
    DEFAULT_ROUTING_BASE_URL.to_string()
}

fn default_routing_timeout_secs() -> u64 {
    DEFAULT_ROUTING_TIMEOUT_SECS
}

fn default_rider_interest_expiry_minutes() -> i64 {
    DEFAULT_RIDER_INTEREST_EXPIRY_MINUTES
}

impl AppConfig {
    /// Build a configuration suitable for tests and embedded use.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            routing_base_url: default_routing_base_url(),
            routing_access_token: None,
            routing_timeout_secs: default_routing_timeout_secs(),
            rider_interest_default_expiry_minutes: default_rider_interest_expiry_minutes(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from config files and environment variables.
///
/// Profile selection follows RUN_ENV (or APP_ENV); `APP__`-prefixed
/// environment variables override file values.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
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

    let config = Config::builder()
        .set_default("database_url", "sqlite://orderflow.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes the tracing subscriber with env-filter and optional JSON
/// output. RUST_LOG takes precedence over the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("orderflow_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18080,
            "test".to_string(),
        );

        assert_eq!(cfg.port, 18080);
        assert!(!cfg.is_production());
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.routing_timeout_secs, DEFAULT_ROUTING_TIMEOUT_SECS);
        assert!(cfg.routing_access_token.is_none());
    }
}
