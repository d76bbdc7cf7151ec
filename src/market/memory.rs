use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use super::feed::{Bar, FeedError, Instrument, PriceFeed, Quote};

/// Process-local feed with settable prices. Used by tests and local runs
/// without a market-data database.
#[derive(Debug, Default)]
pub struct InMemoryPriceFeed {
    quotes: RwLock<HashMap<String, Quote>>,
    history: RwLock<HashMap<String, (i64, Vec<Bar>)>>,
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl InMemoryPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&self, symbol: &str, instrument_token: i64, price: Decimal, prior_close: Decimal) {
        let key = symbol.to_uppercase();
        self.quotes.write().insert(
            key.clone(),
            Quote {
                symbol: key,
                instrument_token,
                price,
                prior_close,
            },
        );
    }

    pub fn set_price(&self, symbol: &str, instrument_token: i64, price: Decimal) {
        self.set_quote(symbol, instrument_token, price, price);
    }

    pub fn set_history(&self, symbol: &str, instrument_token: i64, closes: &[(NaiveDate, Decimal)]) {
        let mut bars: Vec<Bar> = closes
            .iter()
            .map(|(date, close)| Bar {
                date: *date,
                close: *close,
            })
            .collect();
        bars.sort_by_key(|b| b.date);
        self.history
            .write()
            .insert(symbol.to_uppercase(), (instrument_token, bars));
    }

    /// Make the next `n` calls fail with `FeedError::Unavailable`.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of trait calls served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin_call(&self) -> Result<(), FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(FeedError::Unavailable("injected failure".into())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl PriceFeed for InMemoryPriceFeed {
    async fn resolve(&self, symbols: &[String]) -> Result<Vec<Instrument>, FeedError> {
        self.begin_call()?;
        let quotes = self.quotes.read();
        let history = self.history.read();

        Ok(symbols
            .iter()
            .filter_map(|s| {
                let key = s.trim().to_uppercase();
                if let Some(q) = quotes.get(&key) {
                    return Some(Instrument {
                        instrument_token: q.instrument_token,
                        symbol: key,
                    });
                }
                history.get(&key).map(|(token, _)| Instrument {
                    instrument_token: *token,
                    symbol: key,
                })
            })
            .collect())
    }

    async fn get_ticker(&self, symbols: &[String]) -> Result<Vec<Quote>, FeedError> {
        self.begin_call()?;
        let quotes = self.quotes.read();
        Ok(symbols
            .iter()
            .filter_map(|s| quotes.get(&s.trim().to_uppercase()).cloned())
            .collect())
    }

    async fn get_history(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError> {
        self.begin_call()?;
        let (from, to) = (from.date_naive(), to.date_naive());
        Ok(self
            .history
            .read()
            .get(&symbol.trim().to_uppercase())
            .map(|(_, bars)| {
                bars.iter()
                    .filter(|b| b.date >= from && b.date <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}
