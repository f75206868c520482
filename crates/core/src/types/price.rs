//! Type-safe price representation using decimal arithmetic.
//!
//! The catalog encodes prices as decimal strings (e.g. `"1.5"`) so no
//! precision is lost at the source. [`Price`] keeps that string verbatim and
//! only parses it into a [`Decimal`] when arithmetic or display needs it.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a price string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid price: {0:?}")]
pub struct PriceError(String);

/// A price as supplied by the catalog, in the chain's native unit (ETH).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(String);

impl Price {
    /// Create a price from its string encoding.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The string exactly as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the price into a decimal amount.
    ///
    /// Accepts plain decimals (`"0.25"`) and scientific notation (`"2.5e-1"`).
    ///
    /// # Errors
    ///
    /// Returns `PriceError` if the string is not a number.
    pub fn amount(&self) -> Result<Decimal, PriceError> {
        let raw = self.0.trim();
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|_| PriceError(self.0.clone()))
    }

    /// Amount for totals: unparseable prices count as zero.
    #[must_use]
    pub fn amount_or_zero(&self) -> Decimal {
        self.amount().unwrap_or(Decimal::ZERO)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amount() {
            Ok(amount) => f.write_str(&format_price(amount, 2)),
            Err(_) => f.write_str(&self.0),
        }
    }
}

impl From<&str> for Price {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Format an amount with en-US digit grouping and a fixed number of decimals.
///
/// ```rust
/// # use nft_market_core::format_price;
/// # use rust_decimal::Decimal;
/// assert_eq!(format_price(Decimal::new(123_450, 2), 2), "1,234.50");
/// ```
#[must_use]
pub fn format_price(amount: Decimal, decimals: u32) -> String {
    let rounded = amount.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().to_string();

    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if decimals > 0 {
        out.push('.');
        let width = decimals as usize;
        out.push_str(frac_part);
        for _ in frac_part.len()..width {
            out.push('0');
        }
    }
    out
}
