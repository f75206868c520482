//! Cart state and its reducer.
//!
//! [`CartState`] is changed only by applying a [`CartAction`]. Every action is
//! a total function over the state: none of them fail, and an action aimed at
//! a product that is not in the cart is a no-op.
//!
//! # Invariants
//!
//! - At most one [`LineItem`] per product ID.
//! - Every line item present has `quantity >= 1`. Reaching zero removes it.
//! - Items keep the order in which they were first added.
//! - The panel flag (`is_open`) never affects item contents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Product, ProductId};

/// A product and how many of it are in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product snapshot taken when the item was first added.
    #[serde(rename = "nft")]
    pub product: Product,
    pub quantity: u32,
}

impl LineItem {
    /// The product ID of this line.
    #[must_use]
    pub const fn id(&self) -> ProductId {
        self.product.id
    }

    /// Price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.product.price.amount_or_zero() * Decimal::from(self.quantity)
    }
}

/// A state transition for the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add one unit of a product, appending a new line if needed.
    AddItem(Product),
    /// Remove the line for a product.
    RemoveItem(ProductId),
    /// Set a line's quantity, clamped at zero. Zero removes the line.
    SetQuantity { id: ProductId, quantity: i64 },
    /// Add one unit to an existing line.
    IncrementQuantity(ProductId),
    /// Remove one unit from an existing line.
    DecrementQuantity(ProductId),
    /// Empty the cart without touching the panel.
    Clear,
    /// Flip the panel open/closed.
    Toggle,
    /// Open the panel.
    Open,
    /// Close the panel.
    Close,
}

impl CartAction {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddItem(_) => "cart/addItem",
            Self::RemoveItem(_) => "cart/removeItem",
            Self::SetQuantity { .. } => "cart/updateQuantity",
            Self::IncrementQuantity(_) => "cart/incrementQuantity",
            Self::DecrementQuantity(_) => "cart/decrementQuantity",
            Self::Clear => "cart/clearCart",
            Self::Toggle => "cart/toggleCart",
            Self::Open => "cart/openCart",
            Self::Close => "cart/closeCart",
        }
    }
}

/// The shopping cart: ordered line items plus the panel visibility flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartState {
    items: Vec<LineItem>,
    is_open: bool,
}

impl CartState {
    /// An empty, closed cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            is_open: false,
        }
    }

    /// A cart restored from persisted items. The panel always starts closed.
    ///
    /// Lines with a zero quantity and repeated product IDs are dropped so the
    /// restored state upholds the same invariants as a reduced one.
    #[must_use]
    pub fn rehydrated(items: Vec<LineItem>) -> Self {
        let mut restored: Vec<LineItem> = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity == 0 || restored.iter().any(|i| i.id() == item.id()) {
                continue;
            }
            restored.push(item);
        }
        Self {
            items: restored,
            is_open: false,
        }
    }

    /// Apply an action, returning the next state.
    #[must_use]
    pub fn apply(mut self, action: CartAction) -> Self {
        match action {
            CartAction::AddItem(product) => self.add_item(product),
            CartAction::RemoveItem(id) => self.remove_item(id),
            CartAction::SetQuantity { id, quantity } => self.set_quantity(id, quantity),
            CartAction::IncrementQuantity(id) => self.increment(id),
            CartAction::DecrementQuantity(id) => self.decrement(id),
            CartAction::Clear => self.items.clear(),
            CartAction::Toggle => self.is_open = !self.is_open,
            CartAction::Open => self.is_open = true,
            CartAction::Close => self.is_open = false,
        }
        self
    }

    fn position(&self, id: ProductId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn add_item(&mut self, product: Product) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id() == product.id) {
            item.quantity = item.quantity.saturating_add(1);
        } else {
            self.items.push(LineItem {
                product,
                quantity: 1,
            });
        }
    }

    fn remove_item(&mut self, id: ProductId) {
        self.items.retain(|item| item.id() != id);
    }

    fn set_quantity(&mut self, id: ProductId, quantity: i64) {
        let Some(index) = self.position(id) else {
            return;
        };
        let clamped = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
        if clamped == 0 {
            self.items.remove(index);
        } else if let Some(item) = self.items.get_mut(index) {
            item.quantity = clamped;
        }
    }

    fn increment(&mut self, id: ProductId) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id() == id) {
            item.quantity = item.quantity.saturating_add(1);
        }
    }

    fn decrement(&mut self, id: ProductId) {
        let Some(index) = self.position(id) else {
            return;
        };
        if let Some(item) = self.items.get_mut(index) {
            item.quantity = item.quantity.saturating_sub(1);
            if item.quantity == 0 {
                self.items.remove(index);
            }
        }
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Whether the cart panel is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.is_open
    }

    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of price times quantity across all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    /// Total number of units (not distinct products).
    #[must_use]
    pub fn count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Whether a product has a line in the cart.
    #[must_use]
    pub fn is_item_in_cart(&self, id: ProductId) -> bool {
        self.position(id).is_some()
    }

    /// Quantity of a product, or zero if absent.
    #[must_use]
    pub fn item_quantity(&self, id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.id() == id)
            .map_or(0, |item| item.quantity)
    }
}
