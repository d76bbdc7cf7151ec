use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::market::Quote;
use crate::models::{Portfolio, Position};

#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub instrument_token: i64,
    pub symbol: String,
    pub quantity: i64,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub day_change: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioView {
    pub id: Uuid,
    pub balance: Decimal,
    pub equity: Decimal,
    pub total_value: Decimal,
    pub day_change: Decimal,
    pub day_change_percent: Decimal,
    pub positions: Vec<PositionView>,
}

impl PositionView {
    /// Mark a position to `quote`, or to its own basis when no quote exists.
    pub fn mark(position: &Position, quote: Option<&Quote>) -> Self {
        let quantity = Decimal::from(position.quantity);
        let current_price = quote.map(|q| q.price).unwrap_or(position.avg_price);
        let prior_close = quote.map(|q| q.prior_close).unwrap_or(current_price);

        let pnl = (current_price - position.avg_price) * quantity;
        let cost_basis = (position.avg_price * quantity).abs();
        let pnl_percent = if cost_basis.is_zero() {
            Decimal::ZERO
        } else {
            (pnl / cost_basis * Decimal::ONE_HUNDRED).round_dp(2)
        };

        Self {
            instrument_token: position.instrument_token,
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            avg_price: position.avg_price,
            current_price,
            current_value: current_price * quantity,
            pnl,
            pnl_percent,
            day_change: (current_price - prior_close) * quantity,
        }
    }
}

impl PortfolioView {
    pub fn build(portfolio: &Portfolio, positions: &[Position], quotes: &[Quote]) -> Self {
        let by_symbol: HashMap<String, &Quote> = quotes
            .iter()
            .map(|q| (q.symbol.to_uppercase(), q))
            .collect();

        let positions: Vec<PositionView> = positions
            .iter()
            .map(|p| PositionView::mark(p, by_symbol.get(&p.symbol.to_uppercase()).copied()))
            .collect();

        let equity: Decimal = positions.iter().map(|p| p.current_value).sum();
        let day_change: Decimal = positions.iter().map(|p| p.day_change).sum();
        let total_value = portfolio.balance + equity;

        let previous_value = total_value - day_change;
        let day_change_percent = if previous_value.is_zero() {
            Decimal::ZERO
        } else {
            (day_change / previous_value * Decimal::ONE_HUNDRED).round_dp(2)
        };

        Self {
            id: portfolio.id,
            balance: portfolio.balance,
            equity,
            total_value,
            day_change,
            day_change_percent,
            positions,
        }
    }
}
