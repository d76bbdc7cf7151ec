use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::cache::TtlCache;
use super::feed::{with_timeout, Bar, FeedError, Instrument, PriceFeed, Quote};
use super::retry::RetryPolicy;

type HistoryKey = (String, NaiveDate, NaiveDate);

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub quote_ttl: Duration,
    pub quote_capacity: usize,
    pub history_ttl: Duration,
    pub history_capacity: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            quote_ttl: Duration::from_secs(60),
            quote_capacity: 1_000,
            history_ttl: Duration::from_secs(300),
            history_capacity: 256,
            timeout: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

/// Read-path wrapper around a [`PriceFeed`]: per-symbol quote cache,
/// per-window history cache, bounded timeout and retry on every miss.
///
/// Quotes served from here may be up to `quote_ttl` old, so the trade path
/// must not use it.
pub struct CachedPriceFeed {
    inner: Arc<dyn PriceFeed>,
    quotes: TtlCache<String, Quote>,
    history: TtlCache<HistoryKey, Vec<Bar>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl CachedPriceFeed {
    pub fn new(inner: Arc<dyn PriceFeed>, settings: CacheSettings) -> Self {
        Self {
            inner,
            quotes: TtlCache::new(settings.quote_capacity, settings.quote_ttl),
            history: TtlCache::new(settings.history_capacity, settings.history_ttl),
            timeout: settings.timeout,
            retry: settings.retry,
        }
    }
}

#[async_trait]
impl PriceFeed for CachedPriceFeed {
    async fn resolve(&self, symbols: &[String]) -> Result<Vec<Instrument>, FeedError> {
        let inner = &self.inner;
        let limit = self.timeout;
        self.retry
            .run("resolve", move || with_timeout(limit, inner.resolve(symbols)))
            .await
    }

    async fn get_ticker(&self, symbols: &[String]) -> Result<Vec<Quote>, FeedError> {
        let keys: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();

        let mut misses: Vec<String> = Vec::new();
        for key in &keys {
            if self.quotes.get(key).is_none() && !misses.contains(key) {
                misses.push(key.clone());
            }
        }

        let mut fetched: Vec<Quote> = Vec::new();
        if !misses.is_empty() {
            let inner = &self.inner;
            let limit = self.timeout;
            let wanted = &misses;
            fetched = self
                .retry
                .run("ticker", move || with_timeout(limit, inner.get_ticker(wanted)))
                .await?;
            for quote in &fetched {
                self.quotes.insert(quote.symbol.to_uppercase(), quote.clone());
            }
            tracing::debug!(
                requested = keys.len(),
                fetched = fetched.len(),
                cached = self.quotes.len(),
                capacity = self.quotes.capacity(),
                "Quote cache refreshed"
            );
        }

        // Answer in request order; fall back to the fresh batch if the cache
        // already evicted an entry under pressure.
        let mut out: Vec<Quote> = Vec::with_capacity(keys.len());
        for key in &keys {
            if out.iter().any(|q| q.symbol.eq_ignore_ascii_case(key)) {
                continue;
            }
            let hit = self
                .quotes
                .get(key)
                .or_else(|| fetched.iter().find(|q| q.symbol.eq_ignore_ascii_case(key)).cloned());
            if let Some(quote) = hit {
                out.push(quote);
            }
        }
        Ok(out)
    }

    async fn get_history(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError> {
        let key = (symbol.trim().to_uppercase(), from.date_naive(), to.date_naive());
        if let Some(bars) = self.history.get(&key) {
            return Ok(bars);
        }

        let inner = &self.inner;
        let limit = self.timeout;
        let bars = self
            .retry
            .run("history", move || {
                with_timeout(limit, inner.get_history(symbol, from, to))
            })
            .await?;

        if !bars.is_empty() {
            self.history.insert(key, bars.clone());
        }
        Ok(bars)
    }
}
