//! Catalog browsing commands.
//!
//! # Usage
//!
//! ```bash
//! nft-market products list --page 2 --rows 12
//! nft-market products feed
//! nft-market products show 7
//! ```

use nft_market_core::{Product, ProductId};
use nft_market_storefront::catalog::LoadOutcome;
use nft_market_storefront::error::AppError;
use nft_market_storefront::state::AppState;

/// Print one page of NFTs.
///
/// # Errors
///
/// Returns an error if the catalog request fails after retries.
#[allow(clippy::print_stdout)]
pub async fn list(state: &AppState, page: u32, rows: u32) -> Result<(), AppError> {
    if page == 0 || rows == 0 {
        return Err(AppError::BadRequest(
            "page and rows must be at least 1".to_string(),
        ));
    }

    let result = state.catalog().get_list(page, rows).await?;
    for product in &result.products {
        println!("{}", row(product));
    }
    println!(
        "page {page}: {} of {} NFTs",
        result.products.len(),
        result.count
    );
    Ok(())
}

/// Load the infinite feed, printing each page as it arrives.
///
/// # Errors
///
/// Returns the first catalog error; pages loaded before it stay printed.
#[allow(clippy::print_stdout)]
pub async fn feed(state: &AppState, max_pages: Option<u32>) -> Result<(), AppError> {
    let feed = state.product_feed();
    let mut printed = 0;
    let mut loaded_pages = 0;

    while max_pages.is_none_or(|max| loaded_pages < max) {
        let LoadOutcome::Appended { page, added } = feed.load_more().await? else {
            break;
        };
        loaded_pages += 1;

        let products = feed.products();
        for product in products.iter().skip(printed) {
            println!("{}", row(product));
        }
        printed = products.len();
        tracing::debug!(page, added, "Feed page loaded");
    }

    let view = feed.view();
    let total = feed.total_count().unwrap_or(0);
    if view.has_more {
        println!("{printed} of {total} NFTs loaded, more available");
    } else {
        println!("{printed} of {total} NFTs loaded, end of catalog");
    }
    Ok(())
}

/// Print one NFT in full.
///
/// # Errors
///
/// Returns `CatalogError::NotFound` (wrapped) if the NFT does not exist.
#[allow(clippy::print_stdout)]
pub async fn show(state: &AppState, id: ProductId) -> Result<(), AppError> {
    let product = state.catalog().get_detail(id).await?;

    println!("{} (#{})", product.name, product.id);
    println!("price: {}", product.price);
    println!("image: {}", product.image);
    if !product.description.is_empty() {
        println!();
        println!("{}", product.description);
    }

    let quantity = state.cart().item_quantity(id);
    if quantity > 0 {
        println!();
        println!("in cart: {quantity}");
    }
    Ok(())
}

fn row(product: &Product) -> String {
    format!("#{:<6} {:<40} {:>14}", product.id, product.name, product.price.to_string())
}
