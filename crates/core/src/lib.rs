//! NFT Market Core - Shared domain library.
//!
//! This crate provides the types and pure state transitions used across all
//! NFT Market components:
//! - `storefront` - Catalog client, cart store, persistence and checkout
//! - `cli` - Command-line storefront shell
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage access, no HTTP clients, no timers. Everything here can be
//! exercised synchronously from a unit test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product IDs and string-encoded prices,
//!   plus the catalog's product and page shapes
//! - [`cart`] - Cart state, the action reducer and derived selectors
//! - [`checkout`] - Checkout status values shown by the cart panel

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod types;

pub use cart::{CartAction, CartState, LineItem};
pub use checkout::CheckoutStatus;
pub use types::*;
