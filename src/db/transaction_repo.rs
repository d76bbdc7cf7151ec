use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::filter::{FilterBuilder, SortOrder};
use crate::models::{Side, Transaction};

const MAX_HISTORY_LIMIT: i64 = 1_000;

/// Query-string filter for transaction history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub symbol: Option<String>,
    pub action: Option<Side>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl TransactionFilter {
    pub fn to_builder(&self, portfolio_id: Uuid) -> FilterBuilder {
        let mut builder = FilterBuilder::new()
            .eq("portfolio_id", portfolio_id)
            .eq_opt("type", self.action.map(|a| a.as_str()));

        if let Some(symbol) = &self.symbol {
            builder = builder.eq_ignore_case("symbol", symbol.as_str());
        }
        if let Some(since) = self.since {
            builder = builder.gte("timestamp", since);
        }
        if let Some(until) = self.until {
            builder = builder.lte("timestamp", until);
        }

        builder = builder.order_by("timestamp", SortOrder::Desc);

        match self.limit {
            Some(limit) => builder.limit(limit.clamp(1, MAX_HISTORY_LIMIT)),
            None => builder,
        }
    }
}

/// Append an executed trade. Rows are never updated afterwards.
#[allow(clippy::too_many_arguments)]
pub async fn insert_transaction<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    instrument_token: i64,
    symbol: &str,
    side: Side,
    quantity: i64,
    price: Decimal,
    amount: Decimal,
) -> Result<Transaction, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (portfolio_id, instrument_token, symbol, type, quantity, price, amount)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(portfolio_id)
    .bind(instrument_token)
    .bind(symbol)
    .bind(side.as_str())
    .bind(quantity)
    .bind(price)
    .bind(amount)
    .fetch_one(exec)
    .await
}

pub async fn list_transactions<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    filter: &TransactionFilter,
) -> Result<Vec<Transaction>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let mut qb = filter.to_builder(portfolio_id).build("SELECT * FROM transactions");
    qb.build_query_as::<Transaction>().fetch_all(exec).await
}

/// Count transactions of a portfolio.
pub async fn count_transactions<'e, E>(exec: E, portfolio_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE portfolio_id = $1")
        .bind(portfolio_id)
        .fetch_one(exec)
        .await?;

    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_filter_with_window_and_limit() {
        let filter = TransactionFilter {
            symbol: None,
            action: Some(Side::Buy),
            since: Some(Utc::now()),
            until: Some(Utc::now()),
            limit: Some(25),
        };
        let qb = filter.to_builder(Uuid::nil()).build("SELECT * FROM transactions");
        assert_eq!(
            qb.sql(),
            "SELECT * FROM transactions WHERE portfolio_id = $1 AND type = $2 \
             AND timestamp >= $3 AND timestamp <= $4 ORDER BY timestamp DESC LIMIT $5"
        );
    }
}
