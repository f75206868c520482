//! Integration tests for the NFT storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p nft-market-integration-tests
//! ```
//!
//! Tests run against [`MockCatalog`], an in-process axum server that speaks
//! the catalog REST API on `127.0.0.1` with an OS-assigned port. It counts
//! requests and can be told to fail, stall or return garbage, so client
//! behaviour (caching, dedupe, retries, pagination) can be asserted from
//! the outside.
//!
//! # Test Categories
//!
//! - `catalog_client` - Query cache, retries, not-found handling
//! - `feed` - Infinite feed paging against the mock
//! - `cart_persistence` - Cart store with file-backed storage
//! - `checkout_flow` - Browse, add to cart and check out end to end

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use nft_market_core::{Price, Product, ProductId};
use nft_market_storefront::catalog::RetryPolicy;
use nft_market_storefront::config::{CatalogConfig, DEFAULT_FEED_ROWS, StorefrontConfig};
use nft_market_storefront::checkout::CheckoutTimings;
use serde_json::json;
use tokio::task::JoinHandle;
use url::Url;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A catalog product with predictable fields.
#[must_use]
pub fn sample_product(id: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Pixel Punk #{id}"),
        description: format!("Hand-drawn punk number {id}"),
        image: format!("https://cdn.example.com/punks/{id}.png"),
        price: Price::new(format!("{}.{}", id % 10, id % 7)),
        created_at: Some("2024-01-01T00:00:00.000Z".to_string()),
        updated_at: Some("2024-01-02T00:00:00.000Z".to_string()),
    }
}

/// Products `1..=count`, in ID order.
#[must_use]
pub fn sample_products(count: i64) -> Vec<Product> {
    (1..=count).map(sample_product).collect()
}

/// Unique scratch directory under the system temp dir. Not created.
#[must_use]
pub fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("nft-market-{label}-{}", uuid::Uuid::new_v4()))
}

/// Shared mock server state.
#[derive(Default)]
struct MockState {
    products: Mutex<Vec<Product>>,
    list_requests: AtomicUsize,
    detail_requests: AtomicUsize,
    last_list_query: Mutex<Option<HashMap<String, String>>>,
    failures: Mutex<VecDeque<StatusCode>>,
    garbage: AtomicBool,
    delay: Mutex<Duration>,
}

impl MockState {
    /// Apply the configured delay and any injected failure.
    async fn interfere(&self) -> Option<Response> {
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = lock(&self.failures).pop_front();
        if let Some(status) = failure {
            return Some((status, Json(json!({ "message": "injected failure" }))).into_response());
        }

        if self.garbage.load(Ordering::SeqCst) {
            return Some((StatusCode::OK, "<html>not json</html>").into_response());
        }
        None
    }
}

/// In-process mock of the catalog REST API.
///
/// The server task is aborted when the mock is dropped.
pub struct MockCatalog {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockCatalog {
    /// Serve `products` on a fresh local port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start(products: Vec<Product>) -> Self {
        let state = Arc::new(MockState {
            products: Mutex::new(products),
            ..MockState::default()
        });

        let app = Router::new()
            .route("/products", get(list_products))
            .route("/products/{id}", get(get_product))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock catalog");
        let addr = listener.local_addr().expect("Mock catalog has no address");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Serve products `1..=count`.
    pub async fn with_count(count: i64) -> Self {
        Self::start(sample_products(count)).await
    }

    /// Base URL to point a catalog client at.
    ///
    /// # Panics
    ///
    /// Never in practice; the address always forms a valid URL.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("Mock catalog URL is valid")
    }

    /// Catalog config pointing at this server with millisecond retry delays.
    #[must_use]
    pub fn catalog_config(&self) -> CatalogConfig {
        let mut config = CatalogConfig::new(self.url());
        config.retry = RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        };
        config
    }

    /// Full storefront config pointing at this server.
    #[must_use]
    pub fn storefront_config(&self, data_dir: PathBuf) -> StorefrontConfig {
        StorefrontConfig {
            catalog: self.catalog_config(),
            data_dir,
            feed_rows: DEFAULT_FEED_ROWS,
            checkout: CheckoutTimings {
                processing: Duration::from_millis(50),
                success_display: Duration::from_millis(50),
            },
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[must_use]
    pub fn list_requests(&self) -> usize {
        self.state.list_requests.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn detail_requests(&self) -> usize {
        self.state.detail_requests.load(Ordering::SeqCst)
    }

    /// Query parameters of the most recent listing request.
    #[must_use]
    pub fn last_list_query(&self) -> Option<HashMap<String, String>> {
        lock(&self.state.last_list_query).clone()
    }

    /// Answer the next `times` requests with `status`.
    pub fn fail_next(&self, status: u16, times: usize) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        lock(&self.state.failures).extend(std::iter::repeat_n(status, times));
    }

    /// Answer every request with a body that is not JSON.
    pub fn serve_garbage(&self, garbage: bool) {
        self.state.garbage.store(garbage, Ordering::SeqCst);
    }

    /// Hold every response for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.state.delay) = delay;
    }

    /// Rename a product so refetches can be told apart from cached data.
    pub fn rename(&self, id: i64, name: &str) {
        if let Some(product) = lock(&self.state.products)
            .iter_mut()
            .find(|p| p.id.as_i64() == id)
        {
            name.clone_into(&mut product.name);
        }
    }
}

impl Drop for MockCatalog {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn list_products(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.list_requests.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_list_query) = Some(params.clone());

    if let Some(response) = state.interfere().await {
        return response;
    }

    let page = params
        .get("page")
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let rows = params
        .get("rows")
        .and_then(|r| r.parse::<usize>().ok())
        .unwrap_or(12);

    let mut products = lock(&state.products).clone();
    if params.get("sortBy").map(String::as_str) == Some("id") {
        products.sort_by_key(|p| p.id);
        if params.get("orderBy").map(String::as_str) == Some("DESC") {
            products.reverse();
        }
    }

    let count = products.len();
    let page_products: Vec<Product> = products
        .into_iter()
        .skip((page - 1) * rows)
        .take(rows)
        .collect();

    Json(json!({ "products": page_products, "count": count })).into_response()
}

async fn get_product(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    state.detail_requests.fetch_add(1, Ordering::SeqCst);

    if let Some(response) = state.interfere().await {
        return response;
    }

    let product = lock(&state.products)
        .iter()
        .find(|p| p.id.as_i64() == id)
        .cloned();

    match product {
        Some(product) => Json(product).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("NFT {id} not found") })),
        )
            .into_response(),
    }
}
