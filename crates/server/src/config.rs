//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BW_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BW_BASE_URL` - Public URL of this API
//! - `BW_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `BW_HOST` - Bind address (default: 127.0.0.1)
//! - `BW_PORT` - Listen port (default: 5000)
//! - `FRONTEND_URL` - Storefront URL used in emailed links (default: <http://localhost:3000>)
//! - `CORS_ORIGINS` - Comma-separated allowed origins (default: `FRONTEND_URL`)
//! - `REMINDER_INTERVAL_SECS` - Reminder scheduler tick (default: 60)
//! - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   outgoing mail; email is logged instead of sent when `SMTP_HOST` is unset
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Fragments found in sample `.env` values, matched case-insensitively.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Storefront URL, used to build links in emails and notifications
    pub frontend_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Origins allowed to make credentialed cross-origin requests
    pub cors_origins: Vec<String>,
    /// How often the reminder scheduler looks for due reminders
    pub reminder_interval: Duration,
    /// Outgoing mail settings (`None` disables delivery)
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// SMTP settings. `Debug` redacts the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Sender address
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ServerConfig {
    /// Read the configuration, loading `.env` first when one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is unset, a value does
    /// not parse, or the session secret looks guessable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = var("BW_DATABASE_URL")
            .or_else(|| var("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("BW_DATABASE_URL".to_string()))?;
        let base_url = parse_base_url("BW_BASE_URL", &require("BW_BASE_URL")?)?;
        let frontend_url = parse_base_url(
            "FRONTEND_URL",
            var("FRONTEND_URL").as_deref().unwrap_or("http://localhost:3000"),
        )?;
        let cors_origins = var("CORS_ORIGINS")
            .map_or_else(|| vec![frontend_url.clone()], |raw| parse_origin_list(&raw));

        let session_secret = require("BW_SESSION_SECRET")?;
        check_session_secret("BW_SESSION_SECRET", &session_secret)?;

        Ok(Self {
            database_url,
            host: parse_or("BW_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_or("BW_PORT", 5000)?,
            base_url,
            frontend_url,
            session_secret: SecretString::from(session_secret),
            cors_origins,
            reminder_interval: Duration::from_secs(parse_or("REMINDER_INTERVAL_SECS", 60)?),
            email: EmailConfig::from_env()?,
            sentry_dsn: var("SENTRY_DSN"),
            sentry_environment: var("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl EmailConfig {
    /// SMTP is optional. Without `SMTP_HOST` mail is logged, not sent.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = var("SMTP_HOST") else {
            return Ok(None);
        };
        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_or("SMTP_PORT", 587)?,
            smtp_username: require("SMTP_USERNAME")?,
            smtp_password: SecretString::from(require("SMTP_PASSWORD")?),
            from_address: require("EMAIL_FROM")?,
        }))
    }
}

/// A set, non-blank environment variable.
fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn require(key: &str) -> Result<String, ConfigError> {
    var(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse `key` when it is set, otherwise use `default`.
fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Check an absolute http(s) URL and drop any trailing slash.
fn parse_base_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

/// Reject short secrets, copied sample values and low-entropy strings.
fn check_session_secret(key: &str, secret: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| Err(ConfigError::InsecureSecret(key.to_string(), reason));

    let len = secret.chars().count();
    if len < MIN_SESSION_SECRET_LENGTH {
        return insecure(format!("needs {MIN_SESSION_SECRET_LENGTH}+ characters, got {len}"));
    }
    let lower = secret.to_lowercase();
    if let Some(word) = PLACEHOLDER_PATTERNS.iter().find(|w| lower.contains(**w)) {
        return insecure(format!("looks like a sample value (contains '{word}')"));
    }
    let bits = bits_per_char(secret);
    if bits < MIN_ENTROPY_BITS_PER_CHAR {
        return insecure(format!(
            "{bits:.2} bits/char is below {MIN_ENTROPY_BITS_PER_CHAR}; generate it randomly"
        ));
    }
    Ok(())
}

/// Shannon entropy of the character distribution.
#[allow(clippy::cast_precision_loss)]
fn bits_per_char(s: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let total = counts.values().sum::<usize>() as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/best_wishes"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            cors_origins: vec!["http://localhost:3000".to_string()],
            reminder_interval: Duration::from_secs(60),
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_parse_base_url() {
        assert_eq!(
            parse_base_url("FRONTEND_URL", "http://localhost:3000/").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            parse_base_url("FRONTEND_URL", "https://shop.example.org/app/").unwrap(),
            "https://shop.example.org/app"
        );
        assert!(parse_base_url("FRONTEND_URL", "localhost:3000").is_err());
        assert!(parse_base_url("FRONTEND_URL", "ftp://files.example.org").is_err());
    }

    #[test]
    fn test_bits_per_char() {
        assert!(bits_per_char("").abs() < f64::EPSILON);
        assert!((bits_per_char("ab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_session_secret_rules() {
        let check = |s: &str| check_session_secret("BW_SESSION_SECRET", s);
        assert!(matches!(check("Gq8!vN2#kT5@"), Err(ConfigError::InsecureSecret(..))));
        assert!(check("your-session-key-here-0123456789abcdef").is_err());
        assert!(check("abababababababababababababababab").is_err());
        assert!(check("Gq8!vN2#kT5@wZ9$mR4%pL7^cX1&bH6*").is_ok());
    }

    #[test]
    fn test_parse_or_defaults_when_unset() {
        assert_eq!(parse_or("BW_TEST_UNSET_PORT_KEY", 5000_u16).unwrap(), 5000);
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_is_secure_follows_base_url_scheme() {
        let mut config = test_config();
        assert!(!config.is_secure());
        config.base_url = "https://api.bestwishes.shop".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_parse_origin_list() {
        let origins = parse_origin_list(" https://a.shop/ ,, http://localhost:3000");
        assert_eq!(origins, vec!["https://a.shop", "http://localhost:3000"]);
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.mailhost.test".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("hunter2-smtp-credential"),
            from_address: "hello@bestwishes.shop".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.mailhost.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2-smtp-credential"));
    }
}
