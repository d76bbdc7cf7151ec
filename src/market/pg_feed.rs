use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use super::feed::{Bar, FeedError, Instrument, PriceFeed, Quote};

/// Reads the `stock_master` / `stock_history` tables maintained by the
/// ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PgPriceFeed {
    db: PgPool,
}

#[derive(FromRow)]
struct TickerRow {
    instrument_token: i64,
    symbol: String,
    latest: Decimal,
    prior: Option<Decimal>,
}

#[derive(FromRow)]
struct HistoryRow {
    ts: DateTime<Utc>,
    close: Decimal,
}

impl PgPriceFeed {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn upper_all(symbols: &[String]) -> Vec<String> {
    symbols.iter().map(|s| s.trim().to_uppercase()).collect()
}

#[async_trait]
impl PriceFeed for PgPriceFeed {
    async fn resolve(&self, symbols: &[String]) -> Result<Vec<Instrument>, FeedError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT instrument_token, tradingsymbol
            FROM stock_master
            WHERE UPPER(tradingsymbol) = ANY($1)
            "#,
        )
        .bind(upper_all(symbols))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(instrument_token, symbol)| Instrument {
                instrument_token,
                symbol,
            })
            .collect())
    }

    async fn get_ticker(&self, symbols: &[String]) -> Result<Vec<Quote>, FeedError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        // Last two daily closes per token.
        let rows = sqlx::query_as::<_, TickerRow>(
            r#"
            SELECT sm.instrument_token,
                   sm.tradingsymbol AS symbol,
                   closes.latest,
                   closes.prior
            FROM stock_master sm
            CROSS JOIN LATERAL (
                SELECT (ARRAY_AGG(last_two.close ORDER BY last_two.ts DESC))[1] AS latest,
                       (ARRAY_AGG(last_two.close ORDER BY last_two.ts DESC))[2] AS prior
                FROM (
                    SELECT close, ts
                    FROM stock_history
                    WHERE instrument_token = sm.instrument_token
                      AND interval = 'day'
                    ORDER BY ts DESC
                    LIMIT 2
                ) last_two
            ) closes
            WHERE UPPER(sm.tradingsymbol) = ANY($1)
              AND closes.latest IS NOT NULL
            "#,
        )
        .bind(upper_all(symbols))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Quote {
                symbol: r.symbol,
                instrument_token: r.instrument_token,
                price: r.latest,
                prior_close: r.prior.unwrap_or(r.latest),
            })
            .collect())
    }

    async fn get_history(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT h.ts, h.close
            FROM stock_history h
            JOIN stock_master sm ON sm.instrument_token = h.instrument_token
            WHERE UPPER(sm.tradingsymbol) = UPPER($1)
              AND h.interval = 'day'
              AND h.ts >= $2
              AND h.ts <= $3
            ORDER BY h.ts ASC
            "#,
        )
        .bind(symbol.trim())
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Bar {
                date: r.ts.date_naive(),
                close: r.close,
            })
            .collect())
    }
}
