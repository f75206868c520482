//! Cart store: the dispatch pipeline around the core cart reducer.
//!
//! # Architecture
//!
//! - [`CartState`] and its reducer live in `nft_market_core`; they are pure
//! - [`CartStore`] owns the current state behind a `tokio::sync::watch`
//!   channel so views can subscribe to changes
//! - Every dispatch runs the reducer, publishes the new state, then mirrors
//!   the items through the [`PersistenceBridge`] once the state lock is
//!   released
//!
//! Dispatches are serialized by the channel's lock, so the reducer never
//! sees a half-applied update.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nft_market_storefront::cart::{CartStore, FileStorage, PersistenceBridge};
//!
//! let bridge = Arc::new(PersistenceBridge::new(Arc::new(FileStorage::new(".nft-market"))));
//! let cart = CartStore::new(bridge);
//!
//! cart.add_item(product);
//! println!("{} items, total {}", cart.count(), cart.total());
//! ```

pub mod persistence;

pub use persistence::{
    CART_STORAGE_KEY, CartSnapshot, CartStorage, FileStorage, MemoryStorage, PersistenceBridge,
    StorageError,
};

use std::sync::Arc;

use nft_market_core::{CartAction, CartState, LineItem, Product, ProductId};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::debug;

/// Shared handle to the session's cart.
///
/// Cheap to clone; clones see and mutate the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    state: watch::Sender<CartState>,
    bridge: Arc<PersistenceBridge>,
}

impl CartStore {
    /// Create the cart, seeded from any snapshot the bridge restores.
    ///
    /// The panel always starts closed.
    #[must_use]
    pub fn new(bridge: Arc<PersistenceBridge>) -> Self {
        let initial = CartState::rehydrated(bridge.preloaded_items());
        debug!(items = initial.items().len(), "Cart store created");
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(CartStoreInner { state, bridge }),
        }
    }

    /// Apply an action and persist the resulting items.
    pub fn dispatch(&self, action: CartAction) {
        let name = action.name();
        self.inner
            .state
            .send_modify(|state| *state = std::mem::take(state).apply(action));

        let items = {
            let state = self.inner.state.borrow();
            debug!(
                action = name,
                items = state.items().len(),
                count = state.count(),
                is_open = state.is_open(),
                "Cart dispatch"
            );
            state.items().to_vec()
        };
        self.inner.bridge.persist(&items);
    }

    pub fn add_item(&self, product: Product) {
        self.dispatch(CartAction::AddItem(product));
    }

    pub fn remove_item(&self, id: ProductId) {
        self.dispatch(CartAction::RemoveItem(id));
    }

    /// Set a quantity; zero or below removes the item.
    pub fn set_quantity(&self, id: ProductId, quantity: i64) {
        self.dispatch(CartAction::SetQuantity { id, quantity });
    }

    pub fn increment(&self, id: ProductId) {
        self.dispatch(CartAction::IncrementQuantity(id));
    }

    pub fn decrement(&self, id: ProductId) {
        self.dispatch(CartAction::DecrementQuantity(id));
    }

    pub fn clear(&self) {
        self.dispatch(CartAction::Clear);
    }

    pub fn toggle(&self) {
        self.dispatch(CartAction::Toggle);
    }

    pub fn open(&self) {
        self.dispatch(CartAction::Open);
    }

    pub fn close(&self) {
        self.dispatch(CartAction::Close);
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<LineItem> {
        self.inner.state.borrow().items().to_vec()
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        self.inner.state.borrow().total()
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.inner.state.borrow().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().is_empty()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.state.borrow().is_open()
    }

    #[must_use]
    pub fn is_item_in_cart(&self, id: ProductId) -> bool {
        self.inner.state.borrow().is_item_in_cart(id)
    }

    #[must_use]
    pub fn item_quantity(&self, id: ProductId) -> u32 {
        self.inner.state.borrow().item_quantity(id)
    }

    /// Receiver that is notified after every dispatch.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &*self.inner.state.borrow())
            .field("bridge", &self.inner.bridge)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use nft_market_core::Price;

    use super::*;

    fn nft(id: i64, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Test NFT {id}"),
            description: String::new(),
            image: format!("https://example.com/{id}.jpg"),
            price: Price::new(price),
            created_at: None,
            updated_at: None,
        }
    }

    fn store_with(storage: Arc<MemoryStorage>) -> CartStore {
        CartStore::new(Arc::new(PersistenceBridge::new(storage)))
    }

    #[test]
    fn test_concrete_totals() {
        let cart = CartStore::new(Arc::new(PersistenceBridge::detached()));
        cart.add_item(nft(1, "1.5"));
        cart.add_item(nft(1, "1.5"));
        cart.add_item(nft(2, "2.0"));
        assert_eq!(cart.total(), Decimal::new(50, 1));
        assert_eq!(cart.count(), 3);
        assert_eq!(cart.items().len(), 2);
    }

    #[test]
    fn test_every_dispatch_is_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = store_with(storage.clone());

        cart.add_item(nft(1, "1.5"));
        let snapshot: CartSnapshot =
            serde_json::from_str(&storage.get_item(CART_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(snapshot.items.len(), 1);

        cart.set_quantity(ProductId::new(1), 3);
        let snapshot: CartSnapshot =
            serde_json::from_str(&storage.get_item(CART_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(snapshot.items[0].quantity, 3);

        cart.clear();
        let snapshot: CartSnapshot =
            serde_json::from_str(&storage.get_item(CART_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert!(snapshot.items.is_empty());
    }

    #[test]
    fn test_new_store_restores_items_with_panel_closed() {
        let storage = Arc::new(MemoryStorage::new());
        let first = store_with(storage.clone());
        first.add_item(nft(1, "1.5"));
        first.add_item(nft(2, "2.0"));
        first.increment(ProductId::new(2));
        first.open();

        let second = store_with(storage);
        assert_eq!(second.items(), first.items());
        assert!(!second.is_open());
        assert_eq!(second.item_quantity(ProductId::new(2)), 2);
    }

    #[test]
    fn test_persistence_failure_does_not_affect_cart() {
        let cart = store_with(Arc::new(MemoryStorage::with_quota(4)));
        cart.add_item(nft(1, "1.5"));
        cart.increment(ProductId::new(1));
        assert_eq!(cart.item_quantity(ProductId::new(1)), 2);
    }

    #[test]
    fn test_decrement_and_remove() {
        let cart = CartStore::new(Arc::new(PersistenceBridge::detached()));
        cart.add_item(nft(1, "1.5"));
        cart.add_item(nft(2, "2.0"));
        cart.decrement(ProductId::new(1));
        assert!(!cart.is_item_in_cart(ProductId::new(1)));
        cart.remove_item(ProductId::new(2));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_panel_controls() {
        let cart = CartStore::new(Arc::new(PersistenceBridge::detached()));
        cart.toggle();
        assert!(cart.is_open());
        cart.close();
        assert!(!cart.is_open());
        cart.open();
        assert!(cart.snapshot().is_open());
    }

    #[tokio::test]
    async fn test_subscribers_see_dispatches() {
        let cart = CartStore::new(Arc::new(PersistenceBridge::detached()));
        let mut rx = cart.subscribe();
        cart.add_item(nft(1, "1.5"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().count(), 1);
    }

    /// Storage that reacts to the first write by dispatching into the same
    /// cart, the way a listener on the storage side might.
    struct ReentrantStorage {
        cart: std::sync::OnceLock<CartStore>,
        fired: std::sync::atomic::AtomicBool,
        inner: MemoryStorage,
    }

    impl CartStorage for ReentrantStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set_item(key, value)?;
            if !self.fired.swap(true, std::sync::atomic::Ordering::SeqCst)
                && let Some(cart) = self.cart.get()
            {
                cart.open();
            }
            Ok(())
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn test_storage_write_may_dispatch_into_cart() {
        let storage = Arc::new(ReentrantStorage {
            cart: std::sync::OnceLock::new(),
            fired: std::sync::atomic::AtomicBool::new(false),
            inner: MemoryStorage::new(),
        });
        let cart = CartStore::new(Arc::new(PersistenceBridge::new(storage.clone())));
        storage.cart.set(cart.clone()).unwrap();

        cart.add_item(nft(1, "1.5"));

        assert!(cart.is_open());
        assert_eq!(cart.count(), 1);
        let snapshot: CartSnapshot =
            serde_json::from_str(&storage.get_item(CART_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(snapshot.items, cart.items());
    }

    #[test]
    fn test_clones_share_state() {
        let cart = CartStore::new(Arc::new(PersistenceBridge::detached()));
        let other = cart.clone();
        other.add_item(nft(7, "0.7"));
        assert!(cart.is_item_in_cart(ProductId::new(7)));
    }
}
