//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - Base URL of the catalog REST API
//!   (falls back to `NEXT_PUBLIC_API_URL`)
//!
//! ## Optional
//! - `STOREFRONT_DATA_DIR` - Directory for the persisted cart (default: .nft-market)
//! - `STOREFRONT_STALE_SECS` - Seconds a fetched query stays fresh (default: 60)
//! - `STOREFRONT_GC_SECS` - Seconds an unused query stays cached (default: 300)
//! - `STOREFRONT_RETRY_COUNT` - Retries for transient fetch failures (default: 2)
//! - `STOREFRONT_FEED_ROWS` - Products per page in the infinite feed (default: 8)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::catalog::RetryPolicy;
use crate::checkout::CheckoutTimings;

const DEFAULT_STALE_SECS: u64 = 60;
const DEFAULT_GC_SECS: u64 = 300;
const DEFAULT_CACHE_CAPACITY: u64 = 1000;

/// Rows per page for the infinite product feed.
pub const DEFAULT_FEED_ROWS: u32 = 8;

/// Rows per page for a single listing request.
pub const DEFAULT_LIST_ROWS: u32 = 12;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Catalog API and query cache configuration
    pub catalog: CatalogConfig,
    /// Directory holding the persisted cart
    pub data_dir: PathBuf,
    /// Products per page in the infinite feed
    pub feed_rows: u32,
    /// Checkout simulation delays
    pub checkout: CheckoutTimings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
}

/// Catalog API client configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL the `/products` endpoints hang off
    pub api_url: Url,
    /// How long a fetched result is served without a refetch
    pub stale_time: Duration,
    /// How long an unused result stays cached
    pub gc_time: Duration,
    /// Maximum number of cached query results
    pub max_capacity: u64,
    /// Retry behaviour for transient failures
    pub retry: RetryPolicy,
    /// Treat cached data as stale when the window regains focus
    pub refetch_on_window_focus: bool,
    /// Treat cached data as stale when the network comes back
    pub refetch_on_reconnect: bool,
}

impl CatalogConfig {
    /// Catalog configuration with default cache and retry policy.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            stale_time: Duration::from_secs(DEFAULT_STALE_SECS),
            gc_time: Duration::from_secs(DEFAULT_GC_SECS),
            max_capacity: DEFAULT_CACHE_CAPACITY,
            retry: RetryPolicy::default(),
            refetch_on_window_focus: false,
            refetch_on_reconnect: true,
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
    /// Returns `ConfigError` if the API URL is missing or any variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let catalog = CatalogConfig::from_env()?;
        let data_dir = PathBuf::from(get_env_or_default("STOREFRONT_DATA_DIR", ".nft-market"));
        let feed_rows = parse_env_or("STOREFRONT_FEED_ROWS", DEFAULT_FEED_ROWS)?;
        if feed_rows == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_FEED_ROWS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            catalog,
            data_dir,
            feed_rows,
            checkout: CheckoutTimings::default(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_api_url("STOREFRONT_API_URL")?;
        let mut config = Self::new(api_url);
        config.stale_time =
            Duration::from_secs(parse_env_or("STOREFRONT_STALE_SECS", DEFAULT_STALE_SECS)?);
        config.gc_time = Duration::from_secs(parse_env_or("STOREFRONT_GC_SECS", DEFAULT_GC_SECS)?);
        config.retry.retries = parse_env_or("STOREFRONT_RETRY_COUNT", config.retry.retries)?;
        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get the API URL with fallback to `NEXT_PUBLIC_API_URL` (used by the web client).
fn get_api_url(primary_key: &str) -> Result<Url, ConfigError> {
    let (key, raw) = std::env::var(primary_key)
        .map(|v| (primary_key, v))
        .or_else(|_| std::env::var("NEXT_PUBLIC_API_URL").map(|v| ("NEXT_PUBLIC_API_URL", v)))
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))?;
    parse_api_url(key, &raw)
}

/// Parse and validate an API base URL.
fn parse_api_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("not an http(s) base URL: {url}"),
        ));
    }
    Ok(url)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_url_valid() {
        let url = parse_api_url("TEST_URL", "https://api.example.com/v1").unwrap();
        assert_eq!(url.host_str(), Some("api.example.com"));
        assert_eq!(url.path(), "/v1");
    }

    #[test]
    fn test_parse_api_url_rejects_garbage() {
        let err = parse_api_url("TEST_URL", "not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "TEST_URL"));
    }

    #[test]
    fn test_parse_api_url_rejects_non_http() {
        assert!(parse_api_url("TEST_URL", "mailto:shop@example.com").is_err());
        assert!(parse_api_url("TEST_URL", "ftp://example.com").is_err());
    }

    #[test]
    fn test_catalog_config_defaults() {
        let config = CatalogConfig::new(Url::parse("http://localhost:4000").unwrap());
        assert_eq!(config.stale_time, Duration::from_secs(60));
        assert_eq!(config.gc_time, Duration::from_secs(300));
        assert_eq!(config.retry.retries, 2);
        assert!(!config.refetch_on_window_focus);
        assert!(config.refetch_on_reconnect);
    }

    #[test]
    fn test_parse_env_or_uses_default_when_unset() {
        let value: u32 = parse_env_or("NFT_MARKET_TEST_SURELY_UNSET_VAR", 8).unwrap();
        assert_eq!(value, 8);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnvVar("STOREFRONT_API_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Missing environment variable: STOREFRONT_API_URL"
        );
    }
}
