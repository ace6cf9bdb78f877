//! Per-engine cache for markets, prices and exchange rates.
//!
//! Each slot holds one value and the time it was filled. Fills are not
//! coordinated: two callers missing at once both fetch, and the later
//! write wins. Locks are never held across an await.

use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::exchange_rate::ExchangeRates;
use crate::market::MarketRegistry;
use crate::prices::PriceBook;

#[derive(Debug)]
struct Cached<T> {
    value: Arc<T>,
    filled_at: Instant,
}

/// A single cached value with optional expiry.
#[derive(Debug)]
pub struct CacheSlot<T> {
    name: &'static str,
    entry: RwLock<Option<Cached<T>>>,
}

impl<T> CacheSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry: RwLock::new(None),
        }
    }

    /// Cached value, unless it is older than `ttl`.
    pub fn get(&self, ttl: Option<Duration>) -> Option<Arc<T>> {
        let entry = self.entry.read();
        let cached = entry.as_ref()?;
        match ttl {
            Some(ttl) if cached.filled_at.elapsed() >= ttl => None,
            _ => Some(Arc::clone(&cached.value)),
        }
    }

    pub fn put(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        *self.entry.write() = Some(Cached {
            value: Arc::clone(&value),
            filled_at: Instant::now(),
        });
        value
    }

    pub fn clear(&self) {
        *self.entry.write() = None;
    }

    pub fn is_filled(&self) -> bool {
        self.entry.read().is_some()
    }

    /// Cached value, or the result of `fill` stored for next time.
    /// Errors are returned as is and leave the slot untouched.
    pub async fn get_or_try_fill<E, F, Fut>(&self, ttl: Option<Duration>, fill: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(ttl) {
            return Ok(value);
        }
        debug!(slot = self.name, "Cache miss");
        let value = fill().await?;
        Ok(self.put(value))
    }
}

/// Cache owned by one engine instance.
#[derive(Debug)]
pub struct EngineCache {
    ttl: Option<Duration>,
    pub markets: CacheSlot<MarketRegistry>,
    pub prices: CacheSlot<PriceBook>,
    pub rates: CacheSlot<ExchangeRates>,
}

impl EngineCache {
    /// `ttl: None` keeps entries until [`invalidate`](Self::invalidate).
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            markets: CacheSlot::new("markets"),
            prices: CacheSlot::new("prices"),
            rates: CacheSlot::new("exchange_rates"),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Drop every cached value.
    pub fn invalidate(&self) {
        self.markets.clear();
        self.prices.clear();
        self.rates.clear();
        debug!("Engine cache invalidated");
    }
}
