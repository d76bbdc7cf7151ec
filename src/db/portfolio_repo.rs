use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::Portfolio;

/// Create the user's portfolio with `starting_balance` if it does not exist.
/// Safe under concurrent first requests thanks to the unique `user_id`.
pub async fn ensure_portfolio<'e, E>(
    exec: E,
    user_id: Uuid,
    starting_balance: Decimal,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO portfolios (user_id, balance)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(starting_balance)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn find_by_user<'e, E>(exec: E, user_id: Uuid) -> Result<Option<Portfolio>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Portfolio>("SELECT * FROM portfolios WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(exec)
        .await
}

/// Load the user's portfolio, creating it on first access.
pub async fn get_or_create(
    conn: &mut PgConnection,
    user_id: Uuid,
    starting_balance: Decimal,
) -> Result<Portfolio, sqlx::Error> {
    ensure_portfolio(&mut *conn, user_id, starting_balance).await?;

    sqlx::query_as::<_, Portfolio>("SELECT * FROM portfolios WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

/// Load (creating if needed) and take an exclusive row lock on the user's
/// portfolio. The lock is held until the surrounding transaction ends.
pub async fn lock_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
    starting_balance: Decimal,
) -> Result<Portfolio, sqlx::Error> {
    ensure_portfolio(&mut *conn, user_id, starting_balance).await?;

    sqlx::query_as::<_, Portfolio>("SELECT * FROM portfolios WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn update_balance<'e, E>(
    exec: E,
    portfolio_id: Uuid,
    balance: Decimal,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE portfolios SET balance = $2, updated_at = NOW() WHERE id = $1")
        .bind(portfolio_id)
        .bind(balance)
        .execute(exec)
        .await?;

    Ok(())
}

/// Wipe positions, transactions and orders and restore the starting balance.
/// Caller must hold the portfolio lock.
pub async fn reset(
    conn: &mut PgConnection,
    portfolio_id: Uuid,
    starting_balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM positions WHERE portfolio_id = $1")
        .bind(portfolio_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM transactions WHERE portfolio_id = $1")
        .bind(portfolio_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM stock_orders WHERE portfolio_id = $1")
        .bind(portfolio_id)
        .execute(&mut *conn)
        .await?;
    update_balance(&mut *conn, portfolio_id, starting_balance).await
}
