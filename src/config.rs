use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_BACKUP_MAX_DURATION_SECS: u64 = 300;
const DEFAULT_BACKUP_BATCH_SIZE: usize = 200;
const DEV_DEFAULT_JWT_SECRET: &str = "opname_development_secret_key_not_for_production_use_0123456789";

/// Which restore engine the backup import should try first.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupPreference {
    /// Pick from the shape of `database_url`.
    #[default]
    Auto,
    Sql,
    Remote,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 32 characters)
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[validate(range(min = 300, max = 604800))]
    pub jwt_expiration: usize,

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

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

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

    /// Width of the zero-padded running number used when no asset prefix is given
    #[serde(default = "default_asset_number_prefix_width")]
    #[validate(range(min = 1, max = 10))]
    pub asset_number_prefix_width: usize,

    /// Upper bound on a backup import request, in seconds
    #[serde(default = "default_backup_max_duration_secs")]
    #[validate(range(min = 1))]
    pub backup_max_duration_secs: u64,

    /// Maximum accepted backup archive size in bytes
    #[serde(default = "default_backup_max_upload_bytes")]
    pub backup_max_upload_bytes: usize,

    /// Maximum uncompressed size of each file read out of a backup archive
    #[serde(default = "default_backup_max_entry_bytes")]
    #[validate(range(min = 1))]
    pub backup_max_entry_bytes: u64,

    /// Per-request timeout against the remote table store, in seconds
    #[serde(default = "default_backup_remote_timeout_secs")]
    #[validate(range(min = 1))]
    pub backup_remote_timeout_secs: u64,

    /// Base URL of the remote table store (PostgREST-style)
    #[serde(default)]
    pub backup_remote_url: Option<String>,

    /// Service key sent to the remote table store
    #[serde(default)]
    pub backup_remote_key: Option<String>,

    /// Rows per insert batch for both restore engines
    #[serde(default = "default_backup_batch_size")]
    #[validate(range(min = 1, max = 5000))]
    pub backup_batch_size: usize,

    /// Preferred restore engine
    #[serde(default)]
    pub backup_prefer: BackupPreference,

    /// JWT issuer name
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// JWT audience
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,
}

impl AppConfig {
    /// Builds a configuration with every optional field at its default.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            asset_number_prefix_width: default_asset_number_prefix_width(),
            backup_max_duration_secs: default_backup_max_duration_secs(),
            backup_max_upload_bytes: default_backup_max_upload_bytes(),
            backup_max_entry_bytes: default_backup_max_entry_bytes(),
            backup_remote_timeout_secs: default_backup_remote_timeout_secs(),
            backup_remote_url: None,
            backup_remote_key: None,
            backup_batch_size: default_backup_batch_size(),
            backup_prefer: BackupPreference::Auto,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
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

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// The remote table store is usable only when both its URL and key are set.
    pub fn remote_backup_target(&self) -> Option<(&str, &str)> {
        match (&self.backup_remote_url, &self.backup_remote_key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Some((url.as_str(), key.as_str()))
            }
            _ => None,
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.backup_prefer == BackupPreference::Remote && self.remote_backup_target().is_none()
        {
            let mut err = ValidationError::new("backup_remote_required");
            err.message = Some(
                "backup_prefer = \"remote\" needs both APP__BACKUP_REMOTE_URL and APP__BACKUP_REMOTE_KEY".into(),
            );
            errors.add("backup_prefer", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
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

fn default_asset_number_prefix_width() -> usize {
    4
}

fn default_backup_max_duration_secs() -> u64 {
    DEFAULT_BACKUP_MAX_DURATION_SECS
}

fn default_backup_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_backup_max_entry_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_backup_remote_timeout_secs() -> u64 {
    60
}

fn default_backup_batch_size() -> usize {
    DEFAULT_BACKUP_BATCH_SIZE
}

fn default_auth_issuer() -> String {
    "opname-api".to_string()
}

fn default_auth_audience() -> String {
    "opname-auth".to_string()
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

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    const DISALLOWED: [&str; 3] = ["your-secret-key", "default-secret-key", "changeme"];
    if DISALLOWED
        .iter()
        .any(|&bad| trimmed.eq_ignore_ascii_case(bad))
    {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be overridden with a secure random value".into());
        return Err(err);
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must have at least 10 unique characters".into());
        return Err(err);
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("opname_api={},tower_http=debug", level);
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
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
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

    let builder = Config::builder()
        .set_default("database_url", "sqlite://opname.db?mode=rwc")?
        .set_default("jwt_expiration", 28800)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to a random string of at least 32 characters.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "a_sufficiently_random_secret_for_unit_tests_42".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_with_origins_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://opname.example.com".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn remote_preference_requires_url_and_key() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.backup_prefer = BackupPreference::Remote;
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.backup_remote_url = Some("https://store.example.com".into());
        cfg.backup_remote_key = Some("service-key".into());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(
            cfg.remote_backup_target(),
            Some(("https://store.example.com", "service-key"))
        );
    }

    #[test]
    fn blank_remote_key_is_not_a_target() {
        let mut cfg = base_config();
        cfg.backup_remote_url = Some("https://store.example.com".into());
        cfg.backup_remote_key = Some("  ".into());
        assert!(cfg.remote_backup_target().is_none());
    }

    #[test]
    fn weak_jwt_secret_is_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "a".repeat(40);
        assert!(cfg.validate().is_err());
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = base_config();
        assert_eq!(cfg.backup_max_duration_secs, 300);
        assert_eq!(cfg.backup_batch_size, 200);
        assert_eq!(cfg.backup_prefer, BackupPreference::Auto);
        assert_eq!(cfg.asset_number_prefix_width, 4);
        assert!(cfg.validate().is_ok());
    }
}
