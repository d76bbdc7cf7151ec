use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::filter::{FilterBuilder, SortOrder};
use crate::models::{OrderStatus, OrderType, Side, StockOrder};

/// Query-string filter for the order list. Status defaults to `PENDING`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub symbol: Option<String>,
    pub action: Option<Side>,
}

impl OrderFilter {
    pub fn to_builder(&self, portfolio_id: Uuid) -> FilterBuilder {
        let status = self.status.unwrap_or_default();
        let mut builder = FilterBuilder::new()
            .eq("portfolio_id", portfolio_id)
            .eq("status", status.as_str())
            .eq_opt("action", self.action.map(|a| a.as_str()));

        if let Some(symbol) = &self.symbol {
            builder = builder.eq_ignore_case("symbol", symbol.as_str());
        }

        builder.order_by("created_at", SortOrder::Desc)
    }
}

/// Insert a new order in `PENDING` state.
#[allow(clippy::too_many_arguments)]
pub async fn insert_order<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    instrument_token: i64,
    symbol: &str,
    quantity: i64,
    action: Side,
    order_type: OrderType,
    limit_price: Option<Decimal>,
) -> Result<StockOrder, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, StockOrder>(
        r#"
        INSERT INTO stock_orders (portfolio_id, instrument_token, symbol, quantity, action, order_type, limit_price)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(portfolio_id)
    .bind(instrument_token)
    .bind(symbol)
    .bind(quantity)
    .bind(action.as_str())
    .bind(order_type.as_str())
    .bind(limit_price)
    .fetch_one(exec)
    .await
}

pub async fn list_orders<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    filter: &OrderFilter,
) -> Result<Vec<StockOrder>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let mut qb = filter.to_builder(portfolio_id).build("SELECT * FROM stock_orders");
    qb.build_query_as::<StockOrder>().fetch_all(exec).await
}

/// Move an order from `from` to `to` if it belongs to the portfolio and is
/// still in `from`. Returns `None` when nothing matched or the transition is
/// not allowed.
pub async fn transition_status<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<Option<StockOrder>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    if !from.can_transition_to(to) {
        return Ok(None);
    }

    sqlx::query_as::<_, StockOrder>(
        r#"
        UPDATE stock_orders
        SET status = $4,
            executed_at = CASE WHEN $4 = 'EXECUTED' THEN NOW() ELSE executed_at END
        WHERE id = $1 AND portfolio_id = $2 AND status = $3
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(portfolio_id)
    .bind(from.as_str())
    .bind(to.as_str())
    .fetch_optional(exec)
    .await
}
