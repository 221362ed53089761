//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `JWT_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `REFRESH_SECRET` - Refresh token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL, also the allowed CORS origin (default: `http://localhost:3000`)
//! - `JWT_EXPIRES_IN_SECS` - Access token lifetime (default: 86400)
//! - `REFRESH_EXPIRES_IN_SECS` - Refresh token lifetime (default: 6660)
//! - `PAYMENT_WEBHOOK_SECRET` - Enables `Payment-Signature` verification on the webhook
//! - `FREE_SHIPPING_THRESHOLD` - Subtotal above which shipping is free (default: 50)
//! - `FLAT_SHIPPING_FEE` - Shipping charged otherwise (default: 9.99)
//! - `TAX_RATE` - Tax as a fraction of the subtotal (default: 0.10)
//! - `STORE_CURRENCY` - ISO currency code for orders (default: USD)
//! - `SECURE_COOKIES` - Mark auth cookies `Secure` (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use bazaar_core::pricing::PricingPolicy;
use bazaar_core::token::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS};
use bazaar_core::CurrencyCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Token signing configuration
    pub auth: AuthConfig,
    /// Secret for `Payment-Signature` verification; unsigned webhooks are
    /// accepted when unset
    pub payment_webhook_secret: Option<SecretString>,
    /// Shipping and tax rules applied at checkout
    pub pricing: PricingPolicy,
    /// Currency recorded on new orders
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Access and refresh token settings.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub refresh_secret: SecretString,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    /// Whether auth cookies carry the `Secure` attribute
    pub secure_cookies: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

impl StorefrontConfig {
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("STOREFRONT_PORT", "3000")?;
        let base_url = get_env_or_default("STOREFRONT_BASE_URL", "http://localhost:3000");

        let auth = AuthConfig::from_env()?;

        let payment_webhook_secret = get_optional_env("PAYMENT_WEBHOOK_SECRET")
            .map(|value| {
                validate_secret_strength(&value, "PAYMENT_WEBHOOK_SECRET")?;
                Ok(SecretString::from(value))
            })
            .transpose()?;

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            free_shipping_threshold: parse_decimal_or(
                "FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            flat_shipping_fee: parse_decimal_or("FLAT_SHIPPING_FEE", defaults.flat_shipping_fee)?,
            tax_rate: parse_decimal_or("TAX_RATE", defaults.tax_rate)?,
        };
        validate_pricing(&pricing)?;

        let currency = parse_env_or_default("STORE_CURRENCY", "USD")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            auth,
            payment_webhook_secret,
            pricing,
            currency,
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

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_token_secret(&jwt_secret, "JWT_SECRET")?;
        let refresh_secret = get_validated_secret("REFRESH_SECRET")?;
        validate_token_secret(&refresh_secret, "REFRESH_SECRET")?;

        if jwt_secret.expose_secret() == refresh_secret.expose_secret() {
            return Err(ConfigError::InsecureSecret(
                "REFRESH_SECRET".to_string(),
                "must differ from JWT_SECRET".to_string(),
            ));
        }

        let access_ttl_secs =
            parse_env_or_default("JWT_EXPIRES_IN_SECS", &DEFAULT_ACCESS_TTL_SECS.to_string())?;
        let refresh_ttl_secs = parse_env_or_default(
            "REFRESH_EXPIRES_IN_SECS",
            &DEFAULT_REFRESH_TTL_SECS.to_string(),
        )?;

        Ok(Self {
            jwt_secret,
            refresh_secret,
            access_ttl_secs,
            refresh_ttl_secs,
            secure_cookies: parse_env_or_default("SECURE_COOKIES", "true")?,
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

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_decimal_or(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    parse_env_or_default(key, &default.to_string())
}

fn validate_pricing(policy: &PricingPolicy) -> Result<(), ConfigError> {
    if policy.free_shipping_threshold.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            "FREE_SHIPPING_THRESHOLD".to_string(),
            "must not be negative".to_string(),
        ));
    }
    if policy.flat_shipping_fee.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            "FLAT_SHIPPING_FEE".to_string(),
            "must not be negative".to_string(),
        ));
    }
    if policy.tax_rate.is_sign_negative() || policy.tax_rate > Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "TAX_RATE".to_string(),
            "must be a fraction between 0 and 1".to_string(),
        ));
    }
    Ok(())
}

/// Validate that a token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
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
            #[allow(clippy::cast_precision_loss)]
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
            refresh_secret: SecretString::from("Zq8!vN1@hJ4#kP6$wR3%tY5^mX7&bC9*"),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            secure_cookies: false,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-secret-here", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_token_secret_too_short() {
        let secret = SecretString::from("aB3$xY9!");
        let result = validate_token_secret(&secret, "JWT_SECRET");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_pricing_rejects_negative_fee() {
        let policy = PricingPolicy {
            flat_shipping_fee: Decimal::new(-1, 0),
            ..PricingPolicy::default()
        };
        assert!(validate_pricing(&policy).is_err());
    }

    #[test]
    fn test_validate_pricing_rejects_tax_rate_above_one() {
        let policy = PricingPolicy {
            tax_rate: Decimal::new(15, 0),
            ..PricingPolicy::default()
        };
        assert!(validate_pricing(&policy).is_err());
        assert!(validate_pricing(&PricingPolicy::default()).is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            auth: test_auth_config(),
            payment_webhook_secret: None,
            pricing: PricingPolicy::default(),
            currency: CurrencyCode::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_auth_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_auth_config());

        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("86400"));
        assert!(!debug_output.contains("aB3$xY9!"));
        assert!(!debug_output.contains("Zq8!vN1@"));
    }
}
