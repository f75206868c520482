//! Catalog product shapes as served by the REST API.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// A purchasable NFT listing.
///
/// Read-only to the storefront: the cart stores the snapshot it was given at
/// add time and never re-fetches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Image URL.
    pub image: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// One page of the product listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    /// Total number of products available server-side.
    pub count: u64,
}

impl ProductPage {
    /// Number of products on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether this page carries no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
