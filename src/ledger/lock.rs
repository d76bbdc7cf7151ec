use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::portfolio_repo;
use crate::models::Portfolio;

/// A database transaction holding `SELECT ... FOR UPDATE` on one portfolio.
///
/// All position/transaction writes for the portfolio go through
/// [`PortfolioLock::conn`]. Dropping the lock without [`commit`] rolls the
/// transaction back and releases the row lock, on every exit path.
///
/// [`commit`]: PortfolioLock::commit
pub struct PortfolioLock {
    tx: Transaction<'static, Postgres>,
    portfolio: Portfolio,
}

impl PortfolioLock {
    /// Begin a transaction and lock the user's portfolio, creating it with
    /// `starting_balance` on first use.
    pub async fn acquire(
        pool: &PgPool,
        user_id: Uuid,
        starting_balance: Decimal,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let portfolio = portfolio_repo::lock_for_update(&mut *tx, user_id, starting_balance).await?;

        tracing::debug!(
            user_id = %user_id,
            portfolio_id = %portfolio.id,
            "Portfolio locked"
        );

        Ok(Self { tx, portfolio })
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}
