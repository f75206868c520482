//! Cache types for catalog query results.

use std::fmt;

use nft_market_core::{Product, ProductId, ProductPage};
use tokio::time::Instant;

/// Cache key: the endpoint plus its semantic parameters.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum QueryKey {
    List { page: u32, rows: u32 },
    Detail(ProductId),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List { page, rows } => write!(f, "products:list:{page}:{rows}"),
            Self::Detail(id) => write!(f, "products:detail:{id}"),
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Page(ProductPage),
    Product(Box<Product>),
}

/// A cached result plus what is needed to judge its freshness.
#[derive(Debug, Clone)]
pub struct CachedQuery {
    pub value: CacheValue,
    pub fetched_at: Instant,
    /// Cache generation at fetch time; bumping the generation marks all
    /// earlier entries stale.
    pub generation: u64,
}

impl CachedQuery {
    pub fn new(value: CacheValue, generation: u64) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            generation,
        }
    }

    /// Whether this entry can be served without a refetch.
    pub fn is_fresh(&self, stale_time: std::time::Duration, generation: u64) -> bool {
        self.generation == generation && self.fetched_at.elapsed() < stale_time
    }
}
