use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::market::FeedError;
use crate::models::OrderType;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("limit price must be positive for LIMIT orders")]
    InvalidLimitPrice,

    #[error("{0} orders are not accepted by the trade endpoint")]
    UnsupportedOrderType(OrderType),

    #[error("stock or current price not found: {0}")]
    StockNotFound(String),

    #[error("{symbol} is quoted as instrument {quoted}, not {requested}")]
    InstrumentMismatch {
        symbol: String,
        requested: i64,
        quoted: i64,
    },

    #[error("insufficient funds: cost {cost}, balance {balance}")]
    InsufficientFunds { cost: Decimal, balance: Decimal },

    #[error("insufficient margin for short: net liquidity {balance}, required {required}")]
    InsufficientMargin { balance: Decimal, required: Decimal },

    #[error("order {0} not found or not pending")]
    OrderNotFound(Uuid),

    #[error("portfolio not found")]
    PortfolioNotFound,

    #[error(transparent)]
    PriceFeed(#[from] FeedError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidQuantity(_) => "InvalidQuantity",
            LedgerError::InvalidLimitPrice => "InvalidLimitPrice",
            LedgerError::UnsupportedOrderType(_) => "UnsupportedOrderType",
            LedgerError::StockNotFound(_) => "StockNotFound",
            LedgerError::InstrumentMismatch { .. } => "InstrumentMismatch",
            LedgerError::InsufficientFunds { .. } => "InsufficientFunds",
            LedgerError::InsufficientMargin { .. } => "InsufficientMargin",
            LedgerError::OrderNotFound(_) => "OrderNotFound",
            LedgerError::PortfolioNotFound => "PortfolioNotFound",
            LedgerError::PriceFeed(e) => e.kind(),
            LedgerError::Database(_) => "Database",
        }
    }

    /// True for rejections caused by the request rather than infrastructure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LedgerError::PriceFeed(_) | LedgerError::Database(_))
    }
}
