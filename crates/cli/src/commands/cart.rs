//! Cart commands.
//!
//! The cart lives in `STOREFRONT_DATA_DIR`, so edits carry over between
//! invocations.
//!
//! # Usage
//!
//! ```bash
//! nft-market cart add 7
//! nft-market cart set 7 3
//! nft-market cart show
//! ```

use nft_market_core::{ProductId, format_price};
use nft_market_storefront::error::{AppError, add_breadcrumb};
use nft_market_storefront::state::AppState;

/// Print the cart contents, subtotals and total.
#[allow(clippy::print_stdout)]
pub fn show(state: &AppState) {
    let cart = state.cart().snapshot();
    if cart.is_empty() {
        println!("Your cart is empty");
        return;
    }

    for item in cart.items() {
        println!(
            "#{:<6} {:<40} x{:<3} {:>14}",
            item.id(),
            item.product.name,
            item.quantity,
            format_price(item.subtotal(), 2)
        );
    }
    println!("{} items, total {}", cart.count(), format_price(cart.total(), 2));
}

/// Fetch an NFT and add it to the cart.
///
/// # Errors
///
/// Returns an error if the NFT cannot be fetched.
pub async fn add(state: &AppState, id: ProductId) -> Result<(), AppError> {
    let product = state.catalog().get_detail(id).await?;
    let product_id = id.to_string();
    add_breadcrumb("cart", "Added NFT", Some(&[("product_id", product_id.as_str())]));
    tracing::info!(%id, name = %product.name, "Adding to cart");
    state.cart().add_item(product);
    show(state);
    Ok(())
}

pub fn remove(state: &AppState, id: ProductId) {
    state.cart().remove_item(id);
    show(state);
}

pub fn set(state: &AppState, id: ProductId, quantity: i64) {
    state.cart().set_quantity(id, quantity);
    show(state);
}

pub fn increment(state: &AppState, id: ProductId) {
    state.cart().increment(id);
    show(state);
}

pub fn decrement(state: &AppState, id: ProductId) {
    state.cart().decrement(id);
    show(state);
}

pub fn clear(state: &AppState) {
    state.cart().clear();
    show(state);
}
