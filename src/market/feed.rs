use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("price feed query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("price feed timed out after {0:?}")]
    Timeout(Duration),

    #[error("price feed unavailable: {0}")]
    Unavailable(String),
}

impl FeedError {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Timeout(_) => "PriceFeedTimeout",
            FeedError::Database(_) | FeedError::Unavailable(_) => "PriceFeedUnavailable",
        }
    }
}

/// A tradable instrument as known to the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_token: i64,
    pub symbol: String,
}

/// Latest daily close and the one before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub instrument_token: i64,
    pub price: Decimal,
    pub prior_close: Decimal,
}

impl Quote {
    pub fn change(&self) -> Decimal {
        self.price - self.prior_close
    }

    /// Percent change vs prior close, 0 when there is no prior close.
    pub fn change_percent(&self) -> Decimal {
        if self.prior_close.is_zero() {
            return Decimal::ZERO;
        }
        (self.change() / self.prior_close * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub close: Decimal,
}

/// Source of prices. Symbol matching is case-insensitive; results only
/// contain symbols the feed knows about.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn resolve(&self, symbols: &[String]) -> Result<Vec<Instrument>, FeedError>;

    async fn get_ticker(&self, symbols: &[String]) -> Result<Vec<Quote>, FeedError>;

    /// Daily closes in `[from, to]`, ascending by date.
    async fn get_history(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError>;
}

/// Bound a feed call by `limit`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, FeedError>
where
    F: Future<Output = Result<T, FeedError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(FeedError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_change_percent() {
        let quote = Quote {
            symbol: "INFY".into(),
            instrument_token: 408065,
            price: dec!(110),
            prior_close: dec!(100),
        };
        assert_eq!(quote.change(), dec!(10));
        assert_eq!(quote.change_percent(), dec!(10));
    }

    #[test]
    fn test_quote_change_percent_without_prior_close() {
        let quote = Quote {
            symbol: "NEW".into(),
            instrument_token: 1,
            price: dec!(50),
            prior_close: Decimal::ZERO,
        };
        assert_eq!(quote.change_percent(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<(), FeedError> = with_timeout(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(FeedError::Timeout(_))));
    }
}
