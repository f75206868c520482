//! Catalog REST API client.
//!
//! # Architecture
//!
//! - `reqwest` for HTTP, `serde_json` for the response bodies
//! - Results cached in-memory via `moka`, keyed by [`QueryKey`]
//! - Concurrent requests for the same key share one in-flight fetch
//! - Fresh for 60 seconds; afterwards served stale while a background
//!   refresh runs; evicted after 5 minutes without use
//! - Transient failures retried twice with exponential backoff
//!
//! # Endpoints
//!
//! - `GET /products?page={n}&rows={m}&sortBy=id&orderBy=ASC` -> [`ProductPage`]
//! - `GET /products/{id}` -> [`Product`], or 404
//!
//! # Example
//!
//! ```rust,ignore
//! use nft_market_storefront::catalog::CatalogClient;
//!
//! let client = CatalogClient::new(&config.catalog);
//!
//! let page = client.get_list(1, 12).await?;
//! let product = client.get_detail(page.products[0].id).await?;
//! ```

mod cache;
pub mod feed;
pub mod query;
mod retry;

pub use cache::QueryKey;
pub use feed::{FeedView, LoadOutcome, PageSource, ProductFeed};
pub use query::QueryState;
pub use retry::RetryPolicy;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::future::Cache;
use nft_market_core::{Product, ProductId, ProductPage};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::CatalogConfig;
use crate::lock;
use cache::{CacheValue, CachedQuery};

/// Errors that can occur when talking to the catalog API.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Non-success HTTP status.
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// Connection, timeout or body read failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Requested product does not exist.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// Response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl CatalogError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status } => *status >= 500 || *status == 429,
            Self::NotFound(_) | Self::Decode(_) => false,
        }
    }

    /// Whether this is a missing-product failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// HTTP status code, where one is known.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        err.status().map_or_else(
            || Self::Transport(err.to_string()),
            |status| Self::Http {
                status: status.as_u16(),
            },
        )
    }
}

// =============================================================================
// CatalogClient
// =============================================================================

/// Client for the catalog REST API.
///
/// Cheap to clone; clones share the HTTP connection pool and the query cache.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<QueryKey, CachedQuery>,
    stale_time: Duration,
    retry: RetryPolicy,
    refetch_on_window_focus: bool,
    refetch_on_reconnect: bool,
    /// Bumped to mark every cached entry stale at once.
    generation: AtomicU64,
    /// Keys with a background refresh in flight.
    refreshing: Mutex<HashSet<QueryKey>>,
}

impl CatalogClient {
    /// Create a new catalog client.
    #[must_use]
    pub fn new(config: &CatalogConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_idle(config.gc_time)
            .build();

        Self {
            inner: Arc::new(CatalogClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_url.clone(),
                cache,
                stale_time: config.stale_time,
                retry: config.retry,
                refetch_on_window_focus: config.refetch_on_window_focus,
                refetch_on_reconnect: config.refetch_on_reconnect,
                generation: AtomicU64::new(0),
                refreshing: Mutex::new(HashSet::new()),
            }),
        }
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get a page of products sorted by ascending ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails after retries.
    #[instrument(skip(self))]
    pub async fn get_list(&self, page: u32, rows: u32) -> Result<ProductPage, CatalogError> {
        match self.query(QueryKey::List { page, rows }).await? {
            CacheValue::Page(page) => Ok(page),
            CacheValue::Product(_) => Err(CatalogError::Decode(
                "cached value is not a product page".to_string(),
            )),
        }
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist, or
    /// another error if the API request fails after retries.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn get_detail(&self, id: ProductId) -> Result<Product, CatalogError> {
        match self.query(QueryKey::Detail(id)).await? {
            CacheValue::Product(product) => Ok(*product),
            CacheValue::Page(_) => Err(CatalogError::Decode(
                "cached value is not a product".to_string(),
            )),
        }
    }

    // =========================================================================
    // Cache Control
    // =========================================================================

    /// The window regained focus.
    ///
    /// Marks cached data stale only if refetch-on-focus is enabled.
    pub fn on_window_focus(&self) {
        if self.inner.refetch_on_window_focus {
            debug!("Window focus: marking cached queries stale");
            self.mark_all_stale();
        }
    }

    /// The network came back.
    ///
    /// Marks cached data stale only if refetch-on-reconnect is enabled.
    pub fn on_reconnect(&self) {
        if self.inner.refetch_on_reconnect {
            debug!("Reconnected: marking cached queries stale");
            self.mark_all_stale();
        }
    }

    /// Drop every cached result.
    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Number of cached results, after pending evictions are applied.
    pub async fn cached_entries(&self) -> u64 {
        self.inner.cache.run_pending_tasks().await;
        self.inner.cache.entry_count()
    }

    fn mark_all_stale(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Query Pipeline
    // =========================================================================

    /// Resolve a query through the cache.
    async fn query(&self, key: QueryKey) -> Result<CacheValue, CatalogError> {
        let generation = self.generation();

        if let Some(entry) = self.inner.cache.get(&key).await {
            if entry.is_fresh(self.inner.stale_time, generation) {
                debug!(%key, "Cache hit");
            } else {
                debug!(%key, "Serving stale entry, refreshing in background");
                self.spawn_refresh(key);
            }
            return Ok(entry.value);
        }

        debug!(%key, "Cache miss");
        let client = self.clone();
        self.inner
            .cache
            .try_get_with(key, async move {
                let value = client.fetch(key).await?;
                Ok::<_, CatalogError>(CachedQuery::new(value, generation))
            })
            .await
            .map(|entry| entry.value)
            .map_err(|err| (*err).clone())
    }

    /// Refetch a stale key without blocking the caller.
    ///
    /// At most one refresh per key runs at a time. A failed refresh keeps the
    /// stale entry.
    fn spawn_refresh(&self, key: QueryKey) {
        if !lock(&self.inner.refreshing).insert(key) {
            return;
        }

        let client = self.clone();
        tokio::spawn(async move {
            let generation = client.generation();
            match client.fetch(key).await {
                Ok(value) => {
                    client
                        .inner
                        .cache
                        .insert(key, CachedQuery::new(value, generation))
                        .await;
                    debug!(%key, "Background refresh complete");
                }
                Err(err) => {
                    warn!(%key, error = %err, "Background refresh failed, keeping stale data");
                }
            }
            lock(&client.inner.refreshing).remove(&key);
        });
    }

    /// Fetch a key from the network, retrying transient failures.
    async fn fetch(&self, key: QueryKey) -> Result<CacheValue, CatalogError> {
        self.inner.retry.run(move || self.fetch_once(key)).await
    }

    async fn fetch_once(&self, key: QueryKey) -> Result<CacheValue, CatalogError> {
        match key {
            QueryKey::List { page, rows } => {
                let mut url = self.endpoint(&["products"]);
                url.query_pairs_mut()
                    .append_pair("page", &page.to_string())
                    .append_pair("rows", &rows.to_string())
                    .append_pair("sortBy", "id")
                    .append_pair("orderBy", "ASC");
                let page: ProductPage = self.get_json(url, None).await?;
                Ok(CacheValue::Page(page))
            }
            QueryKey::Detail(id) => {
                let url = self.endpoint(&["products", &id.to_string()]);
                let product: Product = self.get_json(url, Some(id)).await?;
                Ok(CacheValue::Product(Box::new(product)))
            }
        }
    }

    /// Build an endpoint URL under the configured base.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Execute a GET request and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        not_found: Option<ProductId>,
    ) -> Result<T, CatalogError> {
        let response = self
            .inner
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND
            && let Some(id) = not_found
        {
            return Err(CatalogError::NotFound(id));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(200).collect::<String>(),
                "Catalog API returned non-success status"
            );
            return Err(CatalogError::Http {
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse catalog response"
            );
            CatalogError::Decode(e.to_string())
        })
    }
}
