//! Simulated checkout.
//!
//! There is no payment backend. A checkout spends a fixed "processing" delay
//! in [`CheckoutStatus::Loading`], shows [`CheckoutStatus::Success`] for a
//! second delay, then clears and closes the cart and returns to idle.
//! Closing the cart at any point abandons the run without touching the items.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nft_market_core::{CartState, CheckoutStatus};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cart::CartStore;
use crate::lock;

/// Delays of the two timed checkout phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutTimings {
    /// Time spent in `Loading` before reporting success
    pub processing: Duration,
    /// Time `Success` stays visible before the cart is cleared
    pub success_display: Duration,
}

impl Default for CheckoutTimings {
    fn default() -> Self {
        Self {
            processing: Duration::from_millis(2000),
            success_display: Duration::from_millis(2500),
        }
    }
}

/// Reasons a checkout cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Cannot check out an empty cart")]
    EmptyCart,
    #[error("A checkout is already in progress")]
    InProgress,
}

/// Drives the checkout state machine against a [`CartStore`].
///
/// Dropping the simulator cancels any pending phase and settles on idle.
pub struct CheckoutSimulator {
    cart: CartStore,
    timings: CheckoutTimings,
    status: Arc<watch::Sender<CheckoutStatus>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CheckoutSimulator {
    #[must_use]
    pub fn new(cart: CartStore, timings: CheckoutTimings) -> Self {
        let (status, _) = watch::channel(CheckoutStatus::Idle);
        Self {
            cart,
            timings,
            status: Arc::new(status),
            task: Mutex::new(None),
        }
    }

    /// Start a checkout.
    ///
    /// Opens the cart panel if it is closed, since closing the panel is what
    /// abandons a run. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InProgress` while a run is loading or showing
    /// success, and `CheckoutError::EmptyCart` when there is nothing to buy.
    pub fn checkout(&self) -> Result<(), CheckoutError> {
        let mut task = lock(&self.task);

        let status = *self.status.borrow();
        let cart_is_empty = self.cart.is_empty();
        if !status.can_start(cart_is_empty) {
            return Err(if status.is_busy() {
                CheckoutError::InProgress
            } else {
                CheckoutError::EmptyCart
            });
        }

        if !self.cart.is_open() {
            self.cart.open();
        }

        info!(
            items = self.cart.count(),
            total = %self.cart.total(),
            "Checkout started"
        );
        self.status.send_replace(CheckoutStatus::Loading);

        let run = run_checkout(self.cart.clone(), Arc::clone(&self.status), self.timings);
        if let Some(previous) = task.replace(tokio::spawn(run)) {
            previous.abort();
        }
        Ok(())
    }

    #[must_use]
    pub fn status(&self) -> CheckoutStatus {
        *self.status.borrow()
    }

    /// Receiver that is notified on every status transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub const fn timings(&self) -> CheckoutTimings {
        self.timings
    }

    /// Cancel any pending phase and go back to idle. The cart is untouched.
    pub fn reset(&self) {
        self.cancel();
        self.status.send_replace(CheckoutStatus::Idle);
    }

    /// Tear down: cancel any pending phase and settle on idle.
    pub fn dispose(&self) {
        self.reset();
    }

    fn cancel(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
            debug!("Pending checkout cancelled");
        }
    }
}

impl Drop for CheckoutSimulator {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CheckoutSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSimulator")
            .field("status", &*self.status.borrow())
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

async fn run_checkout(
    cart: CartStore,
    status: Arc<watch::Sender<CheckoutStatus>>,
    timings: CheckoutTimings,
) {
    let mut cart_rx = cart.subscribe();

    if !hold_unless_closed(&mut cart_rx, timings.processing).await {
        info!("Cart closed during processing, checkout abandoned");
        status.send_replace(CheckoutStatus::Idle);
        return;
    }
    status.send_replace(CheckoutStatus::Success);
    info!("Checkout succeeded");

    if !hold_unless_closed(&mut cart_rx, timings.success_display).await {
        debug!("Cart closed during success display");
        status.send_replace(CheckoutStatus::Idle);
        return;
    }

    cart.clear();
    status.send_replace(CheckoutStatus::Idle);
    cart.close();
}

/// Wait `duration`; returns false if the cart closes first.
async fn hold_unless_closed(cart_rx: &mut watch::Receiver<CartState>, duration: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        () = cart_closed(cart_rx) => false,
    }
}

async fn cart_closed(cart_rx: &mut watch::Receiver<CartState>) {
    let closed = cart_rx.wait_for(|state| !state.is_open()).await.is_ok();
    if !closed {
        // The store is gone, so nothing can close it.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nft_market_core::{Price, Product, ProductId};
    use tokio::time::sleep;

    use super::*;
    use crate::cart::PersistenceBridge;

    fn nft(id: i64, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Test NFT {id}"),
            description: String::new(),
            image: String::new(),
            price: Price::new(price),
            created_at: None,
            updated_at: None,
        }
    }

    fn cart_with_items() -> CartStore {
        let cart = CartStore::new(Arc::new(PersistenceBridge::detached()));
        cart.add_item(nft(1, "1.5"));
        cart.add_item(nft(2, "2.0"));
        cart.open();
        cart
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_checkout_timeline() {
        let cart = cart_with_items();
        let checkout = CheckoutSimulator::new(cart.clone(), CheckoutTimings::default());

        checkout.checkout().unwrap();
        assert_eq!(checkout.status(), CheckoutStatus::Loading);

        sleep(Duration::from_millis(1990)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Loading);

        sleep(Duration::from_millis(20)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Success);
        assert_eq!(cart.count(), 2);
        assert!(cart.is_open());

        sleep(Duration::from_millis(2480)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Success);

        sleep(Duration::from_millis(20)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Idle);
        assert!(cart.is_empty());
        assert!(!cart.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_during_loading_abandons_without_clearing() {
        let cart = cart_with_items();
        let checkout = CheckoutSimulator::new(cart.clone(), CheckoutTimings::default());

        checkout.checkout().unwrap();
        sleep(Duration::from_millis(1000)).await;
        cart.close();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Idle);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Idle);
        assert_eq!(cart.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_during_success_abandons_without_clearing() {
        let cart = cart_with_items();
        let checkout = CheckoutSimulator::new(cart.clone(), CheckoutTimings::default());

        checkout.checkout().unwrap();
        sleep(Duration::from_millis(3000)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Success);
        cart.close();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(checkout.status(), CheckoutStatus::Idle);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(cart.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkout_opens_closed_cart() {
        let cart = cart_with_items();
        cart.close();
        let checkout = CheckoutSimulator::new(cart.clone(), CheckoutTimings::default());

        checkout.checkout().unwrap();
        assert!(cart.is_open());
        sleep(Duration::from_millis(100)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cart_is_rejected() {
        let cart = CartStore::new(Arc::new(PersistenceBridge::detached()));
        let checkout = CheckoutSimulator::new(cart, CheckoutTimings::default());
        assert_eq!(checkout.checkout(), Err(CheckoutError::EmptyCart));
        assert_eq!(checkout.status(), CheckoutStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_checkout_while_busy_is_rejected() {
        let cart = cart_with_items();
        let checkout = CheckoutSimulator::new(cart, CheckoutTimings::default());

        checkout.checkout().unwrap();
        assert_eq!(checkout.checkout(), Err(CheckoutError::InProgress));

        sleep(Duration::from_millis(2100)).await;
        assert_eq!(checkout.checkout(), Err(CheckoutError::InProgress));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_phase() {
        let cart = cart_with_items();
        let checkout = CheckoutSimulator::new(cart.clone(), CheckoutTimings::default());
        let status = checkout.subscribe();

        checkout.checkout().unwrap();
        drop(checkout);
        assert_eq!(*status.borrow(), CheckoutStatus::Idle);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(*status.borrow(), CheckoutStatus::Idle);
        assert_eq!(cart.count(), 2);
        assert!(cart.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_settles_idle_and_allows_new_checkout() {
        let cart = cart_with_items();
        let checkout = CheckoutSimulator::new(cart.clone(), CheckoutTimings::default());

        checkout.checkout().unwrap();
        sleep(Duration::from_millis(2100)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Success);

        checkout.dispose();
        assert_eq!(checkout.status(), CheckoutStatus::Idle);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Idle);
        assert_eq!(cart.count(), 2);

        assert_eq!(checkout.checkout(), Ok(()));
        assert_eq!(checkout.status(), CheckoutStatus::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_to_idle() {
        let cart = cart_with_items();
        let checkout = CheckoutSimulator::new(cart.clone(), CheckoutTimings::default());

        checkout.checkout().unwrap();
        checkout.reset();
        assert_eq!(checkout.status(), CheckoutStatus::Idle);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(checkout.status(), CheckoutStatus::Idle);
        assert_eq!(cart.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_observe_transitions() {
        let cart = cart_with_items();
        let checkout = CheckoutSimulator::new(
            cart,
            CheckoutTimings {
                processing: Duration::from_millis(10),
                success_display: Duration::from_millis(10),
            },
        );
        let mut rx = checkout.subscribe();

        checkout.checkout().unwrap();
        let mut seen = vec![*rx.borrow_and_update()];
        while seen.last() != Some(&CheckoutStatus::Idle) {
            rx.changed().await.unwrap();
            seen.push(*rx.borrow_and_update());
        }
        assert_eq!(
            seen,
            vec![
                CheckoutStatus::Loading,
                CheckoutStatus::Success,
                CheckoutStatus::Idle
            ]
        );
    }

    #[test]
    fn test_default_timings() {
        let timings = CheckoutTimings::default();
        assert_eq!(timings.processing, Duration::from_millis(2000));
        assert_eq!(timings.success_display, Duration::from_millis(2500));
    }
}
