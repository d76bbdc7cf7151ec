pub mod cost_basis;
pub mod engine;
pub mod error;
pub mod fill;
pub mod lock;
pub mod valuation;

pub use cost_basis::{Holding, Transition};
pub use engine::{LedgerSettings, ResetReceipt, TradeEngine, TradeReceipt, TradeRequest};
pub use error::LedgerError;
pub use fill::{plan_fill, FillPlan, PositionChange};
pub use lock::PortfolioLock;
pub use valuation::{PortfolioView, PositionView};
