use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::cost_basis::Holding;
use super::error::LedgerError;
use super::fill::{plan_fill, FillSummary, PositionChange};
use super::lock::PortfolioLock;
use super::valuation::PortfolioView;
use crate::db::order_repo::{self, OrderFilter};
use crate::db::transaction_repo::{self, TransactionFilter};
use crate::db::{portfolio_repo, position_repo};
use crate::market::{with_timeout, PriceFeed, Quote};
use crate::models::{OrderStatus, OrderType, Side, StockOrder, Transaction};

pub const DEFAULT_STARTING_BALANCE: Decimal = dec!(1000000);

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub starting_balance: Decimal,
    /// Upper bound on the live price lookup made before a market fill.
    pub price_timeout: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            starting_balance: DEFAULT_STARTING_BALANCE,
            price_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub instrument_token: i64,
    pub symbol: String,
    pub quantity: i64,
    pub action: Side,
    #[serde(default)]
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub status: &'static str,
    pub message: String,
    pub transaction: Option<Transaction>,
    pub order: Option<StockOrder>,
    pub fill: Option<FillSummary>,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetReceipt {
    pub status: &'static str,
    pub message: String,
    pub balance: Decimal,
}

/// Executes paper trades and serves the ledger's read operations.
///
/// Market fills look up a fresh price on `live_feed` and never touch the
/// cache; portfolio valuation uses `read_feed`, which may be cached.
pub struct TradeEngine {
    db: PgPool,
    live_feed: Arc<dyn PriceFeed>,
    read_feed: Arc<dyn PriceFeed>,
    settings: LedgerSettings,
}

impl TradeEngine {
    pub fn new(
        db: PgPool,
        live_feed: Arc<dyn PriceFeed>,
        read_feed: Arc<dyn PriceFeed>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            db,
            live_feed,
            read_feed,
            settings,
        }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Trading
    // -----------------------------------------------------------------------

    pub async fn execute_trade(
        &self,
        user_id: Uuid,
        req: &TradeRequest,
    ) -> Result<TradeReceipt, LedgerError> {
        let started = Instant::now();
        let result = match req.order_type {
            _ if req.quantity <= 0 => Err(LedgerError::InvalidQuantity(req.quantity)),
            OrderType::Market => self.execute_market(user_id, req).await,
            OrderType::Limit => self.place_limit(user_id, req).await,
            OrderType::Stop => Err(LedgerError::UnsupportedOrderType(OrderType::Stop)),
        };

        match &result {
            Ok(_) => {
                histogram!("trade_latency_seconds").record(started.elapsed().as_secs_f64());
            }
            Err(e) => {
                counter!("trades_rejected_total", "kind" => e.kind()).increment(1);
                if e.is_client_error() {
                    tracing::warn!(
                        user_id = %user_id,
                        symbol = %req.symbol,
                        action = %req.action,
                        quantity = req.quantity,
                        kind = e.kind(),
                        error = %e,
                        "Trade rejected"
                    );
                } else {
                    tracing::error!(
                        user_id = %user_id,
                        symbol = %req.symbol,
                        kind = e.kind(),
                        error = %e,
                        "Trade failed"
                    );
                }
            }
        }

        result
    }

    /// Persist a `PENDING` limit order. No funds or position check happens
    /// here; the order waits for an external trigger.
    async fn place_limit(
        &self,
        user_id: Uuid,
        req: &TradeRequest,
    ) -> Result<TradeReceipt, LedgerError> {
        let limit_price = match req.limit_price {
            Some(p) if p > Decimal::ZERO => p,
            _ => return Err(LedgerError::InvalidLimitPrice),
        };
        let symbol = normalize_symbol(&req.symbol)?;

        let mut tx = self.db.begin().await?;
        let portfolio =
            portfolio_repo::get_or_create(&mut *tx, user_id, self.settings.starting_balance)
                .await?;
        let order = order_repo::insert_order(
            &mut *tx,
            portfolio.id,
            req.instrument_token,
            &symbol,
            req.quantity,
            req.action,
            OrderType::Limit,
            Some(limit_price),
        )
        .await?;
        tx.commit().await?;

        counter!("limit_orders_placed_total").increment(1);
        tracing::info!(
            user_id = %user_id,
            order_id = %order.id,
            symbol = %symbol,
            action = %req.action,
            quantity = req.quantity,
            limit_price = %limit_price,
            "Limit order placed"
        );

        Ok(TradeReceipt {
            status: "success",
            message: format!(
                "Limit {} order placed for {} shares at {}",
                req.action, req.quantity, limit_price
            ),
            transaction: None,
            order: Some(order),
            fill: None,
            new_balance: portfolio.balance,
        })
    }

    /// Fill at the live price inside one locked transaction: balance,
    /// position and transaction row commit together or not at all.
    async fn execute_market(
        &self,
        user_id: Uuid,
        req: &TradeRequest,
    ) -> Result<TradeReceipt, LedgerError> {
        let symbol = normalize_symbol(&req.symbol)?;
        let quote = self.live_quote(&symbol).await?;
        if quote.instrument_token != req.instrument_token {
            return Err(LedgerError::InstrumentMismatch {
                symbol,
                requested: req.instrument_token,
                quoted: quote.instrument_token,
            });
        }
        let price = quote.price;

        let mut lock =
            PortfolioLock::acquire(&self.db, user_id, self.settings.starting_balance).await?;
        let portfolio_id = lock.portfolio().id;
        let balance = lock.portfolio().balance;

        let held = position_repo::find_position(lock.conn(), portfolio_id, req.instrument_token)
            .await?
            .map(|p| Holding {
                quantity: p.quantity,
                avg_price: p.avg_price,
            });

        let plan = plan_fill(balance, held, req.action, req.quantity, price)?;

        portfolio_repo::update_balance(lock.conn(), portfolio_id, plan.new_balance).await?;
        match plan.position {
            PositionChange::Upsert(next) => {
                position_repo::upsert_position(
                    lock.conn(),
                    portfolio_id,
                    req.instrument_token,
                    &symbol,
                    next.quantity,
                    next.avg_price,
                )
                .await?;
            }
            PositionChange::Delete => {
                position_repo::delete_position(lock.conn(), portfolio_id, req.instrument_token)
                    .await?;
            }
        }
        let transaction = transaction_repo::insert_transaction(
            lock.conn(),
            portfolio_id,
            req.instrument_token,
            &symbol,
            req.action,
            req.quantity,
            price,
            plan.total_cost,
        )
        .await?;

        lock.commit().await?;

        counter!("trades_executed_total", "action" => req.action.as_str()).increment(1);
        tracing::info!(
            user_id = %user_id,
            portfolio_id = %portfolio_id,
            symbol = %symbol,
            action = %req.action,
            quantity = req.quantity,
            price = %price,
            amount = %plan.total_cost,
            new_balance = %plan.new_balance,
            transition = ?plan.transition,
            "Trade executed"
        );

        Ok(TradeReceipt {
            status: "success",
            message: format!(
                "Successfully executed {} of {} shares of {}",
                req.action, req.quantity, symbol
            ),
            transaction: Some(transaction),
            order: None,
            fill: Some(plan.summary()),
            new_balance: plan.new_balance,
        })
    }

    /// Fresh quote for a market fill. Bounded by the configured timeout and
    /// never retried.
    async fn live_quote(&self, symbol: &str) -> Result<Quote, LedgerError> {
        let symbols = [symbol.to_string()];
        let quotes = with_timeout(
            self.settings.price_timeout,
            self.live_feed.get_ticker(&symbols),
        )
        .await?;

        quotes
            .into_iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
            .filter(|q| q.price > Decimal::ZERO)
            .ok_or_else(|| LedgerError::StockNotFound(symbol.to_string()))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Balance, marked positions and totals. Creates the portfolio on first
    /// view. Quote failures degrade to basis-priced positions.
    pub async fn portfolio(&self, user_id: Uuid) -> Result<PortfolioView, LedgerError> {
        let mut conn = self.db.acquire().await?;
        let portfolio =
            portfolio_repo::get_or_create(&mut *conn, user_id, self.settings.starting_balance)
                .await?;
        let positions = position_repo::list_positions(&mut *conn, portfolio.id).await?;
        drop(conn);

        let quotes: Vec<Quote> = if positions.is_empty() {
            Vec::new()
        } else {
            let symbols: Vec<String> = positions.iter().map(|p| p.symbol.clone()).collect();
            match self.read_feed.get_ticker(&symbols).await {
                Ok(quotes) => quotes,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        error = %e,
                        "Quotes unavailable, valuing positions at cost basis"
                    );
                    Vec::new()
                }
            }
        };

        Ok(PortfolioView::build(&portfolio, &positions, &quotes))
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        filter: &OrderFilter,
    ) -> Result<Vec<StockOrder>, LedgerError> {
        let Some(portfolio) = portfolio_repo::find_by_user(&self.db, user_id).await? else {
            return Ok(Vec::new());
        };
        Ok(order_repo::list_orders(&self.db, portfolio.id, filter).await?)
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let Some(portfolio) = portfolio_repo::find_by_user(&self.db, user_id).await? else {
            return Ok(Vec::new());
        };
        Ok(transaction_repo::list_transactions(&self.db, portfolio.id, filter).await?)
    }

    // -----------------------------------------------------------------------
    // Order lifecycle / reset
    // -----------------------------------------------------------------------

    pub async fn cancel_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<StockOrder, LedgerError> {
        let portfolio = portfolio_repo::find_by_user(&self.db, user_id)
            .await?
            .ok_or(LedgerError::PortfolioNotFound)?;

        let order = order_repo::transition_status(
            &self.db,
            portfolio.id,
            order_id,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
        )
        .await?
        .ok_or(LedgerError::OrderNotFound(order_id))?;

        counter!("orders_cancelled_total").increment(1);
        tracing::info!(user_id = %user_id, order_id = %order_id, "Order cancelled");

        Ok(order)
    }

    /// Irreversibly wipe positions, transactions and orders and restore the
    /// starting balance. Runs under the portfolio lock so it cannot
    /// interleave with a trade.
    pub async fn reset(&self, user_id: Uuid) -> Result<ResetReceipt, LedgerError> {
        let starting_balance = self.settings.starting_balance;
        let mut lock = PortfolioLock::acquire(&self.db, user_id, starting_balance).await?;
        let portfolio_id = lock.portfolio().id;

        portfolio_repo::reset(lock.conn(), portfolio_id, starting_balance).await?;
        lock.commit().await?;

        counter!("portfolio_resets_total").increment(1);
        tracing::warn!(
            user_id = %user_id,
            portfolio_id = %portfolio_id,
            balance = %starting_balance,
            "Portfolio reset"
        );

        Ok(ResetReceipt {
            status: "success",
            message: format!("Portfolio reset to {starting_balance}"),
            balance: starting_balance,
        })
    }
}

fn normalize_symbol(symbol: &str) -> Result<String, LedgerError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(LedgerError::StockNotFound(symbol));
    }
    Ok(symbol)
}
