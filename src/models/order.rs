use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for stock_orders table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockOrder {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub instrument_token: i64,
    pub symbol: String,
    pub quantity: i64,
    pub action: String,
    pub order_type: String,
    pub limit_price: Option<Decimal>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}
