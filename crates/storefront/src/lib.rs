//! NFT Market Storefront library.
//!
//! Everything the storefront UI talks to, as an explicitly constructed
//! [`state::AppState`] rather than ambient globals:
//!
//! - [`catalog`] - REST catalog client with a query cache, retries and the
//!   infinite product feed
//! - [`cart`] - Cart store, dispatch pipeline and the local persistence bridge
//! - [`checkout`] - Timed checkout simulator
//! - [`config`] - Configuration from environment variables
//! - [`error`] - Unified error type with Sentry reporting

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod state;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
