//! Infinite product feed.
//!
//! Merges sequentially fetched listing pages into one growing list. Pages are
//! requested as 1, 2, 3, ... and flattened in page order, then within-page
//! order; nothing is re-sorted. The feed is done when the number of loaded
//! products reaches the `count` reported by the most recent page, or when a
//! page comes back empty.

use std::future::Future;
use std::sync::Mutex;

use nft_market_core::{Product, ProductPage};
use tracing::debug;

use super::{CatalogClient, CatalogError};
use crate::lock;

/// Anything that can serve listing pages.
pub trait PageSource: Send + Sync {
    /// Fetch one page (1-based) of `rows` products.
    fn fetch_page(
        &self,
        page: u32,
        rows: u32,
    ) -> impl Future<Output = Result<ProductPage, CatalogError>> + Send;
}

impl PageSource for CatalogClient {
    async fn fetch_page(&self, page: u32, rows: u32) -> Result<ProductPage, CatalogError> {
        self.get_list(page, rows).await
    }
}

/// Result of a [`ProductFeed::load_more`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and its products appended.
    Appended { page: u32, added: usize },
    /// Nothing to do: a fetch is already running or the feed is exhausted.
    Skipped,
    /// The feed was reset while the page was in flight; its result was dropped.
    Discarded { page: u32 },
}

/// Snapshot of the feed for rendering.
#[derive(Debug, Clone, Default)]
pub struct FeedView {
    pub products: Vec<Product>,
    pub has_more: bool,
    pub is_fetching_next_page: bool,
    pub error: Option<CatalogError>,
}

#[derive(Debug, Default)]
struct FeedState {
    pages: Vec<ProductPage>,
    fetching: bool,
    error: Option<CatalogError>,
    /// Bumped by `reset`; a fetch started under an older epoch is discarded.
    epoch: u64,
}

impl FeedState {
    fn loaded(&self) -> u64 {
        self.pages.iter().map(|p| p.products.len() as u64).sum()
    }

    fn has_more(&self) -> bool {
        self.pages
            .last()
            .is_none_or(|last| !last.products.is_empty() && self.loaded() < last.count)
    }

    fn next_page(&self) -> Option<u32> {
        if self.has_more() {
            u32::try_from(self.pages.len() + 1).ok()
        } else {
            None
        }
    }
}

/// Accumulates listing pages from a [`PageSource`].
pub struct ProductFeed<S> {
    source: S,
    rows: u32,
    state: Mutex<FeedState>,
}

impl<S: PageSource> ProductFeed<S> {
    /// Create an empty feed requesting `rows` products per page.
    pub fn new(source: S, rows: u32) -> Self {
        Self {
            source,
            rows: rows.max(1),
            state: Mutex::new(FeedState::default()),
        }
    }

    /// Fetch the next page and append its products.
    ///
    /// No-op while another fetch is in flight or once the feed is exhausted.
    /// A failed fetch leaves the loaded pages untouched and can be retried by
    /// calling this again. A result that lands after [`reset`](Self::reset)
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns the catalog error if the page fetch fails.
    pub async fn load_more(&self) -> Result<LoadOutcome, CatalogError> {
        let (page, epoch) = {
            let mut state = lock(&self.state);
            if state.fetching {
                return Ok(LoadOutcome::Skipped);
            }
            let Some(page) = state.next_page() else {
                return Ok(LoadOutcome::Skipped);
            };
            state.fetching = true;
            (page, state.epoch)
        };

        debug!(page, rows = self.rows, "Loading feed page");
        let result = self.source.fetch_page(page, self.rows).await;

        let mut state = lock(&self.state);
        if state.epoch != epoch {
            debug!(page, "Feed reset during fetch, dropping page");
            return Ok(LoadOutcome::Discarded { page });
        }
        state.fetching = false;
        match result {
            Ok(fetched) => {
                let added = fetched.products.len();
                state.pages.push(fetched);
                state.error = None;
                Ok(LoadOutcome::Appended { page, added })
            }
            Err(err) => {
                state.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Keep loading until the feed is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the first catalog error encountered.
    pub async fn load_all(&self) -> Result<usize, CatalogError> {
        let mut pages = 0;
        loop {
            match self.load_more().await? {
                LoadOutcome::Appended { .. } => pages += 1,
                LoadOutcome::Skipped | LoadOutcome::Discarded { .. } => return Ok(pages),
            }
        }
    }

    /// Whether more products remain server-side.
    ///
    /// True before the first page is loaded.
    pub fn has_more(&self) -> bool {
        lock(&self.state).has_more()
    }

    /// The page number the next `load_more` will request.
    pub fn next_page(&self) -> Option<u32> {
        lock(&self.state).next_page()
    }

    pub fn is_fetching_next_page(&self) -> bool {
        lock(&self.state).fetching
    }

    /// All loaded products in page order.
    pub fn products(&self) -> Vec<Product> {
        lock(&self.state)
            .pages
            .iter()
            .flat_map(|page| page.products.iter().cloned())
            .collect()
    }

    /// Loaded pages in request order.
    pub fn pages(&self) -> Vec<ProductPage> {
        lock(&self.state).pages.clone()
    }

    /// Server-side total from the most recent page, if any page is loaded.
    pub fn total_count(&self) -> Option<u64> {
        lock(&self.state).pages.last().map(|page| page.count)
    }

    /// Error from the most recent failed fetch, cleared on the next success.
    pub fn last_error(&self) -> Option<CatalogError> {
        lock(&self.state).error.clone()
    }

    /// Drop all loaded pages and start again from page 1.
    ///
    /// A fetch still in flight is abandoned; its page will not be appended.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.pages.clear();
        state.error = None;
        state.fetching = false;
        state.epoch += 1;
    }

    pub fn view(&self) -> FeedView {
        let state = lock(&self.state);
        FeedView {
            products: state
                .pages
                .iter()
                .flat_map(|page| page.products.iter().cloned())
                .collect(),
            has_more: state.has_more(),
            is_fetching_next_page: state.fetching,
            error: state.error.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use nft_market_core::{Price, ProductId};
    use tokio::sync::Notify;

    use super::*;

    fn product(id: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("NFT #{id}"),
            description: String::new(),
            image: format!("https://example.com/{id}.png"),
            price: Price::new("0.1"),
            created_at: None,
            updated_at: None,
        }
    }

    /// Serves `total` sequential products, recording requested pages.
    struct FakeSource {
        total: u64,
        requested: Mutex<Vec<u32>>,
        fail_next: AtomicU32,
    }

    impl FakeSource {
        fn new(total: u64) -> Self {
            Self {
                total,
                requested: Mutex::new(Vec::new()),
                fail_next: AtomicU32::new(0),
            }
        }
    }

    impl PageSource for FakeSource {
        async fn fetch_page(&self, page: u32, rows: u32) -> Result<ProductPage, CatalogError> {
            self.requested.lock().unwrap().push(page);
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(CatalogError::Http { status: 500 });
            }
            let start = u64::from(page - 1) * u64::from(rows);
            let end = (start + u64::from(rows)).min(self.total);
            let products = (start..end)
                .map(|i| product(i64::try_from(i).unwrap() + 1))
                .collect();
            Ok(ProductPage {
                products,
                count: self.total,
            })
        }
    }

    #[tokio::test]
    async fn test_pages_of_8_8_4_exhaust_feed_of_20() {
        let feed = ProductFeed::new(FakeSource::new(20), 8);
        assert!(feed.has_more());

        assert_eq!(
            feed.load_more().await.unwrap(),
            LoadOutcome::Appended { page: 1, added: 8 }
        );
        assert!(feed.has_more());
        assert_eq!(
            feed.load_more().await.unwrap(),
            LoadOutcome::Appended { page: 2, added: 8 }
        );
        assert!(feed.has_more());
        assert_eq!(
            feed.load_more().await.unwrap(),
            LoadOutcome::Appended { page: 3, added: 4 }
        );
        assert!(!feed.has_more());

        let products = feed.products();
        assert_eq!(products.len(), 20);
        let ids: Vec<i64> = products.iter().map(|p| p.id.as_i64()).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_load_more_after_exhaustion_is_noop() {
        let feed = ProductFeed::new(FakeSource::new(4), 8);
        feed.load_more().await.unwrap();
        assert!(!feed.has_more());
        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Skipped);
        assert_eq!(*feed.source.requested.lock().unwrap(), vec![1]);
        assert_eq!(feed.next_page(), None);
    }

    #[tokio::test]
    async fn test_load_all_requests_sequential_pages() {
        let feed = ProductFeed::new(FakeSource::new(20), 8);
        assert_eq!(feed.load_all().await.unwrap(), 3);
        assert_eq!(*feed.source.requested.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(feed.total_count(), Some(20));
        assert_eq!(feed.pages().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let feed = ProductFeed::new(FakeSource::new(0), 8);
        assert_eq!(
            feed.load_more().await.unwrap(),
            LoadOutcome::Appended { page: 1, added: 0 }
        );
        assert!(!feed.has_more());
        assert!(feed.products().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_pages_and_retries_same_page() {
        let feed = ProductFeed::new(FakeSource::new(20), 8);
        feed.load_more().await.unwrap();
        feed.source.fail_next.store(1, Ordering::SeqCst);

        assert!(feed.load_more().await.is_err());
        assert!(feed.last_error().is_some());
        assert_eq!(feed.products().len(), 8);
        assert!(!feed.is_fetching_next_page());

        assert_eq!(
            feed.load_more().await.unwrap(),
            LoadOutcome::Appended { page: 2, added: 8 }
        );
        assert!(feed.last_error().is_none());
        assert_eq!(*feed.source.requested.lock().unwrap(), vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn test_reset_starts_from_first_page() {
        let feed = ProductFeed::new(FakeSource::new(20), 8);
        feed.load_all().await.unwrap();
        feed.reset();
        assert!(feed.products().is_empty());
        assert_eq!(feed.next_page(), Some(1));
    }

    /// Blocks inside `fetch_page` until released.
    struct GatedSource {
        gate: Arc<Notify>,
        calls: AtomicU32,
    }

    impl PageSource for GatedSource {
        async fn fetch_page(&self, _page: u32, _rows: u32) -> Result<ProductPage, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(ProductPage {
                products: vec![product(1)],
                count: 10,
            })
        }
    }

    #[tokio::test]
    async fn test_load_more_while_in_flight_is_skipped() {
        let gate = Arc::new(Notify::new());
        let feed = Arc::new(ProductFeed::new(
            GatedSource {
                gate: Arc::clone(&gate),
                calls: AtomicU32::new(0),
            },
            1,
        ));

        let first = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.load_more().await }
        });

        while !feed.is_fetching_next_page() {
            tokio::task::yield_now().await;
        }
        assert!(feed.view().is_fetching_next_page);
        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Skipped);

        gate.notify_one();
        assert_eq!(
            first.await.unwrap().unwrap(),
            LoadOutcome::Appended { page: 1, added: 1 }
        );
        assert_eq!(feed.source.calls.load(Ordering::SeqCst), 1);
        assert!(!feed.is_fetching_next_page());
    }

    /// Serves page 1 at once and holds later pages until released.
    struct SecondPageGate {
        gate: Arc<Notify>,
    }

    impl PageSource for SecondPageGate {
        async fn fetch_page(&self, page: u32, _rows: u32) -> Result<ProductPage, CatalogError> {
            if page > 1 {
                self.gate.notified().await;
            }
            Ok(ProductPage {
                products: vec![product(i64::from(page) * 100)],
                count: 10,
            })
        }
    }

    #[tokio::test]
    async fn test_page_landing_after_reset_is_dropped() {
        let gate = Arc::new(Notify::new());
        let feed = Arc::new(ProductFeed::new(
            SecondPageGate {
                gate: Arc::clone(&gate),
            },
            1,
        ));
        feed.load_more().await.unwrap();

        let second = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.load_more().await }
        });
        while !feed.is_fetching_next_page() {
            tokio::task::yield_now().await;
        }

        feed.reset();
        assert!(!feed.is_fetching_next_page());

        gate.notify_one();
        assert_eq!(
            second.await.unwrap().unwrap(),
            LoadOutcome::Discarded { page: 2 }
        );
        assert!(feed.products().is_empty());
        assert_eq!(feed.next_page(), Some(1));

        assert_eq!(
            feed.load_more().await.unwrap(),
            LoadOutcome::Appended { page: 1, added: 1 }
        );
        let ids: Vec<i64> = feed.products().iter().map(|p| p.id.as_i64()).collect();
        assert_eq!(ids, vec![100]);
    }

    /// Claims 20 products but runs dry after the first page.
    struct ShortSource;

    impl PageSource for ShortSource {
        async fn fetch_page(&self, page: u32, rows: u32) -> Result<ProductPage, CatalogError> {
            let products = if page == 1 {
                (1..=i64::from(rows)).map(product).collect()
            } else {
                Vec::new()
            };
            Ok(ProductPage {
                products,
                count: 20,
            })
        }
    }

    #[tokio::test]
    async fn test_empty_page_ends_feed_despite_count() {
        let feed = ProductFeed::new(ShortSource, 8);
        assert_eq!(feed.load_all().await.unwrap(), 2);
        assert!(!feed.has_more());
        assert_eq!(feed.next_page(), None);
        assert_eq!(feed.products().len(), 8);
        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Skipped);
    }
}
