use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_RAZORPAY_API_BASE_URL: &str = "https://api.razorpay.com/v1";
const DEFAULT_RECONCILIATION_BATCH_LIMIT: u64 = 100;
const DEFAULT_RECONCILIATION_DELAY_MS: u64 = 100;

/// Razorpay credentials and client tuning
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RazorpayConfig {
    /// Public key id (`rzp_live_...` / `rzp_test_...`)
    #[serde(default)]
    pub key_id: String,

    /// Secret key; also signs checkout confirmations
    #[serde(default)]
    pub key_secret: String,

    /// Dedicated webhook secret. Falls back to `key_secret` when unset.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Base URL of the gateway REST API
    #[serde(default = "default_razorpay_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_gateway_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RazorpayConfig {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            key_secret: String::new(),
            webhook_secret: None,
            api_base_url: default_razorpay_api_base_url(),
            request_timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

impl RazorpayConfig {
    /// Secret used to verify webhook bodies
    pub fn webhook_secret(&self) -> &str {
        self.webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.key_secret)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Settings for the payment reconciliation job
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconciliationConfig {
    /// Most recent paid orders examined per run
    #[serde(default = "default_reconciliation_batch_limit")]
    pub batch_limit: u64,

    /// Pause between gateway lookups, in milliseconds
    #[serde(default = "default_reconciliation_delay_ms")]
    pub request_delay_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_RECONCILIATION_BATCH_LIMIT,
            request_delay_ms: DEFAULT_RECONCILIATION_DELAY_MS,
        }
    }
}

impl ReconciliationConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

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

    /// Currency used when a request does not name one
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,

    /// Tax applied to the checkout subtotal (e.g. 0.05 for 5%)
    #[serde(default)]
    #[validate(custom = "validate_tax_rate")]
    pub tax_rate: Decimal,

    /// Flat shipping fee charged below the free-shipping threshold
    #[serde(default)]
    pub shipping_fee: Decimal,

    /// Subtotal at or above which shipping is free
    #[serde(default)]
    pub free_shipping_threshold: Option<Decimal>,

    /// Payment gateway settings
    #[serde(default)]
    pub razorpay: RazorpayConfig,

    /// Reconciliation job settings
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            default_currency: default_currency(),
            tax_rate: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
            free_shipping_threshold: None,
            razorpay: RazorpayConfig::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
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
    DEFAULT_CURRENCY.to_string()
}

fn default_razorpay_api_base_url() -> String {
    DEFAULT_RAZORPAY_API_BASE_URL.to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    30
}

fn default_reconciliation_batch_limit() -> u64 {
    DEFAULT_RECONCILIATION_BATCH_LIMIT
}

fn default_reconciliation_delay_ms() -> u64 {
    DEFAULT_RECONCILIATION_DELAY_MS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_tax_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if rate.is_sign_negative() || *rate > Decimal::ONE {
        let mut err = ValidationError::new("tax_rate");
        err.message = Some("tax_rate must be between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*), e.g. `APP__RAZORPAY__KEY_ID`
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
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
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

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn tax_rate_above_one_is_rejected() {
        let mut cfg = base_config();
        cfg.tax_rate = dec!(1.5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn webhook_secret_falls_back_to_key_secret() {
        let mut razorpay = RazorpayConfig {
            key_id: "rzp_test_key".into(),
            key_secret: "key-secret".into(),
            ..Default::default()
        };
        assert_eq!(razorpay.webhook_secret(), "key-secret");

        razorpay.webhook_secret = Some("  ".into());
        assert_eq!(razorpay.webhook_secret(), "key-secret");

        razorpay.webhook_secret = Some("hook-secret".into());
        assert_eq!(razorpay.webhook_secret(), "hook-secret");
    }
}
