//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Commerce backend (one of the two is required)
//! - `SHOPIFY_STOREFRONT_API_URL` - Full Storefront GraphQL endpoint URL
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com),
//!   combined with `SHOPIFY_API_VERSION` (default: 2026-01)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SHOPIFY_STOREFRONT_ACCESS_TOKEN` - Storefront API token (tokenless if unset)
//! - `SANITY_PROJECT_ID` - Content backend project (content disabled if unset)
//! - `SANITY_DATASET` - Content dataset (default: production)
//! - `SANITY_API_VERSION` - Content API version (default: 2024-01-01)
//! - `SANITY_USE_CDN` - Query the CDN host (default: true)
//! - `BREVO_API_KEY` / `BREVO_LIST_ID` - Newsletter provider (disabled if unset)
//! - `CURSOR_CACHE_TTL_SECS` - Pagination cursor lifetime (default: 300)
//! - `LISTING_FETCH_TIMEOUT_SECS` - Listing/search/wishlist timeout (default: 12)
//! - `CART_RETRY_ATTEMPTS` - Total cart reconcile attempts on conflict (default: 3)
//! - `CART_RETRY_BASE_DELAY_MS` - Linear backoff step (default: 250)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Shopify Storefront API configuration
    pub shopify: ShopifyStorefrontConfig,
    /// Sanity content backend configuration (None disables content)
    pub sanity: Option<SanityConfig>,
    /// Brevo newsletter configuration (None answers 503)
    pub newsletter: Option<NewsletterConfig>,
    /// Pagination and cart sync tuning
    pub tuning: TuningConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

/// Shopify Storefront API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopifyStorefrontConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,
    /// Storefront API access token; requests go out tokenless when absent
    pub access_token: Option<SecretString>,
}

impl std::fmt::Debug for ShopifyStorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyStorefrontConfig")
            .field("endpoint", &self.endpoint)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Sanity content backend configuration.
#[derive(Debug, Clone)]
pub struct SanityConfig {
    /// Sanity project ID
    pub project_id: String,
    /// Dataset name (e.g., production)
    pub dataset: String,
    /// API version date (e.g., 2024-01-01)
    pub api_version: String,
    /// Query the CDN host instead of the live API
    pub use_cdn: bool,
}

/// Brevo mailing list configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct NewsletterConfig {
    /// Brevo API key
    pub api_key: SecretString,
    /// Numeric list ID contacts are added to
    pub list_id: i64,
}

impl std::fmt::Debug for NewsletterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsletterConfig")
            .field("api_key", &"[REDACTED]")
            .field("list_id", &self.list_id)
            .finish()
    }
}

/// Tuning knobs for listings and cart synchronization.
#[derive(Debug, Clone)]
pub struct TuningConfig {
    /// Lifetime of a cursor cache entry
    pub cursor_cache_ttl: Duration,
    /// Bound on a single listing/search/wishlist lookup
    pub listing_fetch_timeout: Duration,
    /// Total reconcile attempts when the backend reports a conflict
    pub cart_retry_attempts: u32,
    /// Linear backoff step between reconcile attempts
    pub cart_retry_base_delay: Duration,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            cursor_cache_ttl: Duration::from_secs(300),
            listing_fetch_timeout: Duration::from_secs(12),
            cart_retry_attempts: 3,
            cart_retry_base_delay: Duration::from_millis(250),
        }
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
    /// if provided secrets look like placeholders.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;

        Ok(Self {
            host,
            port,
            shopify: ShopifyStorefrontConfig::from_env()?,
            sanity: SanityConfig::from_env()?,
            newsletter: NewsletterConfig::from_env()?,
            tuning: TuningConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            log_json: parse_env_or_default::<bool>("LOG_JSON", "false")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ShopifyStorefrontConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let endpoint = match get_optional_env("SHOPIFY_STOREFRONT_API_URL") {
            Some(url) => {
                url::Url::parse(&url).map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "SHOPIFY_STOREFRONT_API_URL".to_string(),
                        e.to_string(),
                    )
                })?;
                url
            }
            None => {
                let store = get_optional_env("SHOPIFY_STORE").ok_or_else(|| {
                    ConfigError::MissingEnvVar(
                        "SHOPIFY_STOREFRONT_API_URL or SHOPIFY_STORE".to_string(),
                    )
                })?;
                let api_version = get_env_or_default("SHOPIFY_API_VERSION", "2026-01");
                format!("https://{store}/api/{api_version}/graphql.json")
            }
        };

        Ok(Self {
            endpoint,
            access_token: get_optional_secret("SHOPIFY_STOREFRONT_ACCESS_TOKEN")?,
        })
    }
}

impl SanityConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(project_id) = get_optional_env("SANITY_PROJECT_ID") else {
            return Ok(None);
        };

        Ok(Some(Self {
            project_id,
            dataset: get_env_or_default("SANITY_DATASET", "production"),
            api_version: get_env_or_default("SANITY_API_VERSION", "2024-01-01"),
            use_cdn: parse_env_or_default::<bool>("SANITY_USE_CDN", "true")?,
        }))
    }
}

impl NewsletterConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let api_key = get_optional_secret("BREVO_API_KEY")?;
        let list_id = get_optional_env("BREVO_LIST_ID");

        match (api_key, list_id) {
            (Some(api_key), Some(list_id)) => {
                let list_id = list_id.trim().parse::<i64>().map_err(|e| {
                    ConfigError::InvalidEnvVar("BREVO_LIST_ID".to_string(), e.to_string())
                })?;
                Ok(Some(Self { api_key, list_id }))
            }
            _ => Ok(None),
        }
    }
}

impl TuningConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl_secs = parse_env_or_default::<u64>("CURSOR_CACHE_TTL_SECS", "300")?;
        let timeout_secs = parse_env_or_default::<u64>("LISTING_FETCH_TIMEOUT_SECS", "12")?;
        let attempts = parse_env_or_default::<u32>("CART_RETRY_ATTEMPTS", "3")?;
        let delay_ms = parse_env_or_default::<u64>("CART_RETRY_BASE_DELAY_MS", "250")?;

        if attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CART_RETRY_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            cursor_cache_ttl: Duration::from_secs(ttl_secs),
            listing_fetch_timeout: Duration::from_secs(timeout_secs),
            cart_retry_attempts: attempts,
            cart_retry_base_delay: Duration::from_millis(delay_ms),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to a default.
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

/// Load and validate an optional secret from environment.
fn get_optional_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    let Some(value) = get_optional_env(key) else {
        return Ok(None);
    };
    validate_secret_strength(&value, key)?;
    Ok(Some(SecretString::from(value)))
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
    let len = s.chars().count() as f64;
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

    // Real API tokens are long random strings
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

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
        let err = validate_secret_strength("your-api-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_hex_token() {
        // Storefront tokens are 32 hex chars
        let result = validate_secret_strength("3f9a1c7e5b2d8046af13c9e7d5b1a024", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = TuningConfig::default();
        assert_eq!(tuning.cursor_cache_ttl, Duration::from_secs(300));
        assert_eq!(tuning.listing_fetch_timeout, Duration::from_secs(12));
        assert_eq!(tuning.cart_retry_attempts, 3);
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            shopify: ShopifyStorefrontConfig {
                endpoint: "https://test.myshopify.com/api/2026-01/graphql.json".to_string(),
                access_token: None,
            },
            sanity: None,
            newsletter: None,
            tuning: TuningConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            log_json: false,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let shopify = ShopifyStorefrontConfig {
            endpoint: "https://test.myshopify.com/api/2026-01/graphql.json".to_string(),
            access_token: Some(SecretString::from("super_secret_storefront_token")),
        };
        let newsletter = NewsletterConfig {
            api_key: SecretString::from("xkeysib-super-secret-brevo-key"),
            list_id: 7,
        };

        let debug_output = format!("{shopify:?} {newsletter:?}");

        assert!(debug_output.contains("test.myshopify.com"));
        assert!(debug_output.contains("list_id: 7"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_storefront_token"));
        assert!(!debug_output.contains("super-secret-brevo-key"));
    }

    #[test]
    fn test_exposed_secret_roundtrip() {
        let secret = SecretString::from("abc");
        assert_eq!(secret.expose_secret(), "abc");
    }
}
