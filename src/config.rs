use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_BROADCAST_CAPACITY: usize = 64;
const DEFAULT_AGGREGATION_TIMEOUT_SECS: u64 = 30;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Host address to bind the server
    pub host: String,

    /// Port for the HTTP server (1024-65535)
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment (development, staging, production)
    pub environment: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Run pending migrations on startup
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,

    /// Capacity of the report broadcast channel; observers further behind
    /// than this many reports start losing the oldest ones
    #[serde(default = "default_broadcast_capacity")]
    #[validate(range(min = 1, max = 4096))]
    pub broadcast_capacity: usize,

    /// Upper bound on a single report aggregation, in seconds
    #[serde(default = "default_aggregation_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub aggregation_timeout_secs: u64,

    /// Allowed CORS origin for the dashboard frontend, if restricted
    #[serde(default)]
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn aggregation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.aggregation_timeout_secs)
    }
}

fn default_auto_migrate() -> bool {
    true
}

fn default_broadcast_capacity() -> usize {
    DEFAULT_BROADCAST_CAPACITY
}

fn default_aggregation_timeout_secs() -> u64 {
    DEFAULT_AGGREGATION_TIMEOUT_SECS
}

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Initialize tracing with env-filter support.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("sales_analytics_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
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
        .set_default("database_url", "sqlite://sales_analytics.db?mode=rwc")?
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
    app_config.validate()?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_a_valid_config() {
        let config = load_config().expect("defaults should load");
        assert!(!config.database_url.is_empty());
        assert!(config.broadcast_capacity >= 1);
        assert!(config.aggregation_timeout_secs >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn aggregation_timeout_converts_to_duration() {
        let config = load_config().expect("defaults should load");
        assert_eq!(
            config.aggregation_timeout(),
            std::time::Duration::from_secs(config.aggregation_timeout_secs)
        );
    }
}
