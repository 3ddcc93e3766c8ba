//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SELLERDESK_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SELLERDESK_BASE_URL` - Public URL for the dashboard
//! - `SELLERDESK_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SELLERDESK_HOST` - Bind address (default: 127.0.0.1)
//! - `SELLERDESK_PORT` - Listen port (default: 3000)
//! - `IDENTITY_WEBHOOK_SECRET` - Identity provider signing secret (`whsec_...`).
//!   When unset the webhook endpoint answers 500 instead of refusing to boot.
//! - `PROVISIONING_ROLE_POLICY` - `preserve_admin` (default) or `force_seller`
//! - `DB_TRANSACTION_TIMEOUT_MS` - Work timeout per transaction (default: 30000)
//! - `DB_TRANSACTION_MAX_WAIT_MS` - Connection wait per transaction (default: 35000)
//! - `DB_TRANSACTION_MAX_RETRIES` - Attempts per transaction (default: 3)
//! - `DB_TRANSACTION_RETRY_DELAY_MS` - First retry delay (default: 1000)
//! - `DB_TRANSACTION_MAX_RETRY_DELAY_MS` - Cap on any retry delay (default: uncapped)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `SELLERDESK_LOG_FORMAT` - `text` (default) or `json`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sellerdesk_core::RolePolicy;
use sellerdesk_core::transaction::TransactionOptions;
use thiserror::Error;

use crate::webhooks::SigningSecret;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the dashboard
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Database settings
    pub database: DatabaseConfig,
    /// Identity provider webhook settings
    pub identity: IdentityConfig,
    /// Emit logs as JSON lines instead of text
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("session_secret", &"[REDACTED]")
            .field("database", &self.database)
            .field("identity", &self.identity)
            .field("json_logs", &self.json_logs)
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

/// Database pool and transaction defaults.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub url: SecretString,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Defaults applied to every `run_in_transaction` call
    pub transaction: TransactionOptions,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("transaction", &self.transaction)
            .finish()
    }
}

/// Identity provider webhook configuration.
#[derive(Clone, Default)]
pub struct IdentityConfig {
    /// Webhook signing secret; `None` when not configured
    pub webhook_secret: Option<SigningSecret>,
    /// Role applied when an existing user is updated
    pub role_policy: RolePolicy,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("role_policy", &self.role_policy)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("SELLERDESK_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("SELLERDESK_PORT", "3000")?;
        let base_url = get_required_env("SELLERDESK_BASE_URL")?;
        let session_secret = get_validated_secret("SELLERDESK_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SELLERDESK_SESSION_SECRET")?;

        Ok(Self {
            host,
            port,
            base_url,
            session_secret,
            database: DatabaseConfig::from_env()?,
            identity: IdentityConfig::from_env()?,
            json_logs: parse_log_format()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl DatabaseConfig {
    /// Load database settings from the environment.
    ///
    /// Also used by the CLI, which needs the pool but not the HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is missing or a numeric setting is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = TransactionOptions::default();

        let mut transaction = TransactionOptions {
            timeout: parse_millis_or("DB_TRANSACTION_TIMEOUT_MS", defaults.timeout)?,
            max_wait: parse_millis_or("DB_TRANSACTION_MAX_WAIT_MS", defaults.max_wait)?,
            max_retries: parse_env_or_default(
                "DB_TRANSACTION_MAX_RETRIES",
                &defaults.max_retries.to_string(),
            )?,
            initial_retry_delay: parse_millis_or(
                "DB_TRANSACTION_RETRY_DELAY_MS",
                defaults.initial_retry_delay,
            )?,
            max_retry_delay: None,
        };
        if get_optional_env("DB_TRANSACTION_MAX_RETRY_DELAY_MS").is_some() {
            transaction.max_retry_delay = Some(parse_millis_or(
                "DB_TRANSACTION_MAX_RETRY_DELAY_MS",
                Duration::ZERO,
            )?);
        }

        Ok(Self {
            url: get_database_url("SELLERDESK_DATABASE_URL")?,
            max_connections: parse_env_or_default("DB_MAX_CONNECTIONS", "10")?,
            transaction,
        })
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = get_optional_env("IDENTITY_WEBHOOK_SECRET")
            .map(|raw| {
                SigningSecret::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("IDENTITY_WEBHOOK_SECRET".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let role_policy = parse_env_or_default("PROVISIONING_ROLE_POLICY", "preserve_admin")?;

        Ok(Self {
            webhook_secret,
            role_policy,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a millisecond duration, falling back to `default` when unset.
fn parse_millis_or(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_env_or_default::<u64>(key, &default_ms.to_string()).map(Duration::from_millis)
}

/// Read `SELLERDESK_LOG_FORMAT`; `true` for JSON.
fn parse_log_format() -> Result<bool, ConfigError> {
    match get_optional_env("SELLERDESK_LOG_FORMAT").as_deref() {
        None | Some("text") => Ok(false),
        Some("json") => Ok(true),
        Some(other) => Err(ConfigError::InvalidEnvVar(
            "SELLERDESK_LOG_FORMAT".to_string(),
            format!("expected `text` or `json`, got `{other}`"),
        )),
    }
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
