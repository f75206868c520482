//! Simulated checkout command.

use nft_market_core::{CheckoutStatus, format_price};
use nft_market_storefront::error::AppError;
use nft_market_storefront::state::AppState;

/// Check out the cart and follow the status until it settles.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` (wrapped) when there is nothing to buy.
#[allow(clippy::print_stdout)]
pub async fn run(state: &AppState) -> Result<(), AppError> {
    let checkout = state.checkout();
    let mut status = checkout.subscribe();

    let total = format_price(state.cart().total(), 2);
    checkout.checkout()?;
    println!("Checking out {} items, total {total}", state.cart().count());

    loop {
        let current = *status.borrow_and_update();
        if current == CheckoutStatus::Idle {
            break;
        }
        println!("{}", current.label());
        if status.changed().await.is_err() {
            break;
        }
    }

    if state.cart().is_empty() {
        println!("Cart cleared");
    }
    Ok(())
}
