//! Configuration module for the school backend.
//!
//! All configuration is loaded once at startup from environment variables with sensible
//! defaults, then handed to the components that need it.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default lifetime of an access token (1 day).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
/// Default lifetime of a refresh token (10 days).
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 10 * 24 * 60 * 60;

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug)]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Outbound SMS gateway settings.
#[derive(Debug, Clone, Default)]
pub struct SmsConfig {
    /// Gateway endpoint; SMS sending is disabled when absent
    pub gateway_url: Option<String>,
    pub api_key: Option<String>,
    pub sender_id: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    /// Access token lifetime in seconds
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: u64,
    /// Mark auth cookies `Secure`
    pub cookie_secure: bool,
    /// Set when a token secret was missing and had to be generated
    pub generated_secrets: bool,
    pub sms: SmsConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("SCHOOL_DB_PATH")
            .unwrap_or_else(|_| "./data/school.sqlite".to_string())
            .into();

        let bind_addr = env::var("SCHOOL_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError {
                variable: "SCHOOL_BIND_ADDR",
                message: e.to_string(),
            })?;

        let log_level = env::var("SCHOOL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let access_secret = env::var("SCHOOL_ACCESS_TOKEN_SECRET").ok();
        let refresh_secret = env::var("SCHOOL_REFRESH_TOKEN_SECRET").ok();
        let generated_secrets = access_secret.is_none() || refresh_secret.is_none();

        let access_token_ttl = parse_u64(
            "SCHOOL_ACCESS_TOKEN_TTL_SECS",
            DEFAULT_ACCESS_TOKEN_TTL_SECS,
        )?;
        let refresh_token_ttl = parse_u64(
            "SCHOOL_REFRESH_TOKEN_TTL_SECS",
            DEFAULT_REFRESH_TOKEN_TTL_SECS,
        )?;

        let cookie_secure = env::var("SCHOOL_COOKIE_SECURE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let sms = SmsConfig {
            gateway_url: env::var("SCHOOL_SMS_GATEWAY_URL").ok(),
            api_key: env::var("SCHOOL_SMS_API_KEY").ok(),
            sender_id: env::var("SCHOOL_SMS_SENDER_ID").unwrap_or_else(|_| "SCHOOL".to_string()),
        };

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            access_token_secret: access_secret.unwrap_or_else(random_secret),
            refresh_token_secret: refresh_secret.unwrap_or_else(random_secret),
            access_token_ttl,
            refresh_token_ttl,
            cookie_secure,
            generated_secrets,
            sms,
        })
    }
}

fn parse_u64(variable: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError {
            variable,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Tokens signed with a generated secret do not survive a restart.
fn random_secret() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}
