//! Application state shared across the storefront surface.

use std::sync::Arc;

use crate::cart::{CartStorage, CartStore, FileStorage, PersistenceBridge};
use crate::catalog::{CatalogClient, ProductFeed};
use crate::checkout::CheckoutSimulator;
use crate::config::StorefrontConfig;

/// Application state for one storefront session.
///
/// This struct is cheaply cloneable via `Arc`. It is the single place the
/// catalog client, the cart store and the persistence bridge are created,
/// so every view works against the same instances.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: CatalogClient,
    cart: CartStore,
}

impl AppState {
    /// Create the state with the cart persisted under `config.data_dir`.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let storage: Arc<dyn CartStorage> = Arc::new(FileStorage::new(config.data_dir.clone()));
        Self::with_bridge(config, PersistenceBridge::new(storage))
    }

    /// Create the state with an explicit persistence bridge.
    ///
    /// Use [`PersistenceBridge::detached`] where no storage is available.
    #[must_use]
    pub fn with_bridge(config: StorefrontConfig, bridge: PersistenceBridge) -> Self {
        let catalog = CatalogClient::new(&config.catalog);
        let cart = CartStore::new(Arc::new(bridge));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                cart,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog API client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// A fresh infinite feed over the shared catalog client.
    #[must_use]
    pub fn product_feed(&self) -> ProductFeed<CatalogClient> {
        ProductFeed::new(self.inner.catalog.clone(), self.inner.config.feed_rows)
    }

    /// A checkout simulator bound to the shared cart.
    #[must_use]
    pub fn checkout(&self) -> CheckoutSimulator {
        CheckoutSimulator::new(self.inner.cart.clone(), self.inner.config.checkout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use nft_market_core::{Price, Product, ProductId};
    use url::Url;

    use super::*;
    use crate::cart::MemoryStorage;
    use crate::checkout::CheckoutTimings;
    use crate::config::{CatalogConfig, DEFAULT_FEED_ROWS};

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            catalog: CatalogConfig::new(Url::parse("http://localhost:3000").unwrap()),
            data_dir: PathBuf::from(".nft-market-test"),
            feed_rows: DEFAULT_FEED_ROWS,
            checkout: CheckoutTimings::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_clones_share_cart() {
        let state = AppState::with_bridge(config(), PersistenceBridge::detached());
        let other = state.clone();
        other.cart().add_item(Product {
            id: ProductId::new(1),
            name: "Test NFT".to_string(),
            description: String::new(),
            image: String::new(),
            price: Price::new("1.5"),
            created_at: None,
            updated_at: None,
        });
        assert_eq!(state.cart().count(), 1);
    }

    #[test]
    fn test_cart_restored_from_bridge() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item(
                crate::cart::CART_STORAGE_KEY,
                r#"{"items":[{"nft":{"id":4,"name":"A","description":"","image":"","price":"2"},"quantity":3}],"updatedAt":1}"#,
            )
            .unwrap();
        let state = AppState::with_bridge(config(), PersistenceBridge::new(storage));
        assert_eq!(state.cart().item_quantity(ProductId::new(4)), 3);
        assert!(!state.cart().is_open());
    }

    #[test]
    fn test_feed_uses_configured_rows() {
        let state = AppState::with_bridge(config(), PersistenceBridge::detached());
        let feed = state.product_feed();
        assert_eq!(feed.next_page(), Some(1));
        assert!(feed.products().is_empty());
    }
}
