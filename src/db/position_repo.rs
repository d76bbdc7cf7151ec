use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Position;

pub async fn find_position<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    instrument_token: i64,
) -> Result<Option<Position>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Position>(
        "SELECT * FROM positions WHERE portfolio_id = $1 AND instrument_token = $2",
    )
    .bind(portfolio_id)
    .bind(instrument_token)
    .fetch_optional(exec)
    .await
}

/// Insert a position or overwrite quantity/avg_price of the existing one.
pub async fn upsert_position<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    instrument_token: i64,
    symbol: &str,
    quantity: i64,
    avg_price: Decimal,
) -> Result<Position, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Position>(
        r#"
        INSERT INTO positions (portfolio_id, instrument_token, symbol, quantity, avg_price)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (portfolio_id, instrument_token)
        DO UPDATE SET quantity = $4, avg_price = $5, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(portfolio_id)
    .bind(instrument_token)
    .bind(symbol)
    .bind(quantity)
    .bind(avg_price)
    .fetch_one(exec)
    .await
}

pub async fn delete_position<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    instrument_token: i64,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM positions WHERE portfolio_id = $1 AND instrument_token = $2")
        .bind(portfolio_id)
        .bind(instrument_token)
        .execute(exec)
        .await?;

    Ok(())
}

/// All open positions of a portfolio, long and short.
pub async fn list_positions<'e, E>(exec: E, portfolio_id: Uuid) -> Result<Vec<Position>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Position>(
        "SELECT * FROM positions WHERE portfolio_id = $1 ORDER BY symbol ASC",
    )
    .bind(portfolio_id)
    .fetch_all(exec)
    .await
}
