//! Checkout status shown by the cart panel.
//!
//! The simulated checkout moves `Idle -> Loading -> Success -> Idle`. The
//! timers that drive it live in the storefront crate; this module only knows
//! the states and which ones accept a new checkout.

use serde::{Deserialize, Serialize};

/// Where the simulated checkout currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    #[default]
    Idle,
    /// Simulated processing, no network call is made.
    Loading,
    /// Purchase shown as complete; the cart clears when this ends.
    Success,
}

impl CheckoutStatus {
    /// Whether a checkout is underway and the trigger should be disabled.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Whether a checkout may start from this state for a cart of the given size.
    #[must_use]
    pub const fn can_start(self, cart_is_empty: bool) -> bool {
        matches!(self, Self::Idle) && !cart_is_empty
    }

    /// Checkout button label for this state.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Checkout",
            Self::Loading => "Processing...",
            Self::Success => "Purchase complete!",
        }
    }
}

impl std::fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Success => write!(f, "success"),
        }
    }
}
