pub mod order;
pub mod portfolio;
pub mod position;
pub mod transaction;

pub use order::StockOrder;
pub use portfolio::Portfolio;
pub use position::Position;
pub use transaction::Transaction;

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OrderType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    Stop,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a stock order. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Executed,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Executed => "EXECUTED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (
                OrderStatus::Pending,
                OrderStatus::Executed | OrderStatus::Cancelled | OrderStatus::Rejected
            )
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_wire_values() {
        let parsed: Side = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(parsed, Side::Sell);
        assert!(serde_json::from_str::<Side>("\"HOLD\"").is_err());
        assert_eq!(Side::Buy.to_string(), "BUY");
    }

    #[test]
    fn test_order_status_transitions() {
        let pending = OrderStatus::Pending;
        assert!(pending.can_transition_to(OrderStatus::Executed));
        assert!(pending.can_transition_to(OrderStatus::Cancelled));
        assert!(pending.can_transition_to(OrderStatus::Rejected));
        assert!(!pending.can_transition_to(OrderStatus::Pending));

        for terminal in [OrderStatus::Executed, OrderStatus::Cancelled, OrderStatus::Rejected] {
            assert!(!terminal.can_transition_to(OrderStatus::Pending));
            assert!(!terminal.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn test_order_type_serde_uppercase() {
        let json = serde_json::to_string(&OrderType::Limit).unwrap();
        assert_eq!(json, "\"LIMIT\"");
        let parsed: OrderType = serde_json::from_str("\"MARKET\"").unwrap();
        assert_eq!(parsed, OrderType::Market);
    }
}
