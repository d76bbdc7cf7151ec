use rust_decimal::Decimal;
use serde::Serialize;

use super::cost_basis::{signed_delta, Holding, Transition};
use super::error::LedgerError;
use crate::models::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    Upsert(Holding),
    Delete,
}

/// Everything a market fill will write, computed before touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillPlan {
    pub side: Side,
    pub quantity: i64,
    pub price: Decimal,
    pub total_cost: Decimal,
    pub new_balance: Decimal,
    pub transition: Transition,
    pub position: PositionChange,
}

/// Summary of a plan for logs and responses.
#[derive(Debug, Clone, Serialize)]
pub struct FillSummary {
    pub transition: Transition,
    pub position_quantity: i64,
    pub position_avg_price: Option<Decimal>,
}

impl FillPlan {
    pub fn summary(&self) -> FillSummary {
        match self.position {
            PositionChange::Upsert(h) => FillSummary {
                transition: self.transition,
                position_quantity: h.quantity,
                position_avg_price: Some(h.avg_price),
            },
            PositionChange::Delete => FillSummary {
                transition: self.transition,
                position_quantity: 0,
                position_avg_price: None,
            },
        }
    }
}

/// Validate a market fill against the locked balance and current holding.
///
/// BUY needs `balance >= price * quantity`. SELL always credits cash; when
/// the result is short, the new balance must cover `|new_qty| * price`
/// (equality passes).
pub fn plan_fill(
    balance: Decimal,
    held: Option<Holding>,
    side: Side,
    quantity: i64,
    price: Decimal,
) -> Result<FillPlan, LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::InvalidQuantity(quantity));
    }

    let overflow = || LedgerError::InvalidQuantity(quantity);
    let total_cost = price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(overflow)?;
    let old = held.unwrap_or(Holding::FLAT);
    let delta = signed_delta(side, quantity);
    let transition = Transition::classify(old.quantity, delta).map_err(|_| overflow())?;
    let next = transition.apply(old, delta, price).map_err(|_| overflow())?;
    let new_qty = next.map_or(0, |h| h.quantity);

    let new_balance = match side {
        Side::Buy => {
            if balance < total_cost {
                return Err(LedgerError::InsufficientFunds {
                    cost: total_cost,
                    balance,
                });
            }
            balance - total_cost
        }
        Side::Sell => {
            let new_balance = balance
                .checked_add(total_cost)
                .ok_or_else(overflow)?;
            if new_qty < 0 {
                let required = Decimal::from(new_qty.unsigned_abs())
                    .checked_mul(price)
                    .ok_or_else(overflow)?;
                if new_balance < required {
                    return Err(LedgerError::InsufficientMargin {
                        balance: new_balance,
                        required,
                    });
                }
            }
            new_balance
        }
    };

    let position = match next {
        Some(next) => PositionChange::Upsert(next),
        None => PositionChange::Delete,
    };

    Ok(FillPlan {
        side,
        quantity,
        price,
        total_cost,
        new_balance,
        transition,
        position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const START: Decimal = dec!(1000000);

    fn held(quantity: i64, avg_price: Decimal) -> Option<Holding> {
        Some(Holding {
            quantity,
            avg_price,
        })
    }

    fn upserted(plan: &FillPlan) -> Holding {
        match plan.position {
            PositionChange::Upsert(h) => h,
            PositionChange::Delete => panic!("expected an open position"),
        }
    }

    #[test]
    fn test_buy_debits_exact_cost() {
        let plan = plan_fill(START, None, Side::Buy, 10, dec!(250.5)).unwrap();
        assert_eq!(plan.total_cost, dec!(2505));
        assert_eq!(plan.new_balance, START - dec!(2505));
        assert_eq!(plan.transition, Transition::Open);
        assert_eq!(upserted(&plan), Holding { quantity: 10, avg_price: dec!(250.5) });
    }

    #[test]
    fn test_two_buys_average_to_110() {
        let first = plan_fill(START, None, Side::Buy, 5, dec!(100)).unwrap();
        let after_first = upserted(&first);
        let second =
            plan_fill(first.new_balance, Some(after_first), Side::Buy, 5, dec!(120)).unwrap();

        assert_eq!(second.transition, Transition::ExtendLong);
        assert_eq!(upserted(&second), Holding { quantity: 10, avg_price: dec!(110) });
        assert_eq!(second.new_balance, START - dec!(1100));
    }

    #[test]
    fn test_buy_rejected_when_funds_short() {
        let err = plan_fill(dec!(999), None, Side::Buy, 10, dec!(100)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_buy_with_exact_funds_passes() {
        let plan = plan_fill(dec!(1000), None, Side::Buy, 10, dec!(100)).unwrap();
        assert_eq!(plan.new_balance, Decimal::ZERO);
    }

    #[test]
    fn test_non_positive_quantity_rejected_for_both_sides() {
        for side in [Side::Buy, Side::Sell] {
            for qty in [0, -3] {
                let err = plan_fill(START, None, side, qty, dec!(100)).unwrap_err();
                assert!(matches!(err, LedgerError::InvalidQuantity(q) if q == qty));
            }
        }
    }

    #[test]
    fn test_sell_reducing_long_keeps_basis() {
        let plan = plan_fill(START, held(10, dec!(100)), Side::Sell, 4, dec!(130)).unwrap();
        assert_eq!(plan.transition, Transition::ReduceLong);
        assert_eq!(plan.new_balance, START + dec!(520));
        assert_eq!(upserted(&plan), Holding { quantity: 6, avg_price: dec!(100) });
    }

    #[test]
    fn test_sell_to_zero_deletes_then_fresh_basis() {
        let close = plan_fill(START, held(10, dec!(100)), Side::Sell, 10, dec!(90)).unwrap();
        assert_eq!(close.transition, Transition::Close);
        assert_eq!(close.position, PositionChange::Delete);

        let reopen = plan_fill(close.new_balance, None, Side::Buy, 3, dec!(95)).unwrap();
        assert_eq!(upserted(&reopen), Holding { quantity: 3, avg_price: dec!(95) });
    }

    #[test]
    fn test_buy_covering_short_keeps_basis() {
        let plan = plan_fill(START, held(-10, dec!(100)), Side::Buy, 4, dec!(90)).unwrap();
        assert_eq!(plan.transition, Transition::ReduceShort);
        assert_eq!(upserted(&plan), Holding { quantity: -6, avg_price: dec!(100) });
    }

    #[test]
    fn test_sell_credits_cash_even_when_opening_short() {
        let plan = plan_fill(START, None, Side::Sell, 10, dec!(100)).unwrap();
        assert_eq!(plan.new_balance, START + dec!(1000));
        assert_eq!(upserted(&plan), Holding { quantity: -10, avg_price: dec!(100) });
    }

    #[test]
    fn test_short_margin_boundary() {
        // new_balance = 0 + 10 * 100 = 1000 = |−10| * 100 → accepted.
        let plan = plan_fill(Decimal::ZERO, None, Side::Sell, 10, dec!(100)).unwrap();
        assert_eq!(plan.new_balance, dec!(1000));

        // Extending an existing short: 999.99 + 1000 falls one cent short of 20 * 100.
        let err = plan_fill(dec!(999.99), held(-10, dec!(100)), Side::Sell, 10, dec!(100))
            .unwrap_err();
        match err {
            LedgerError::InsufficientMargin { balance, required } => {
                assert_eq!(balance, dec!(1999.99));
                assert_eq!(required, dec!(2000));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_extend_short_weighted_average() {
        let plan = plan_fill(START, held(-10, dec!(100)), Side::Sell, 10, dec!(80)).unwrap();
        assert_eq!(plan.transition, Transition::ExtendShort);
        assert_eq!(upserted(&plan), Holding { quantity: -20, avg_price: dec!(90) });
    }

    #[test]
    fn test_flip_long_to_short_resets_basis() {
        let plan = plan_fill(START, held(10, dec!(100)), Side::Sell, 15, dec!(120)).unwrap();
        assert_eq!(plan.transition, Transition::FlipToShort);
        assert_eq!(upserted(&plan), Holding { quantity: -5, avg_price: dec!(120) });
    }

    #[test]
    fn test_quantity_overflow_rejected_before_any_write() {
        let err = plan_fill(dec!(1000), held(-2, dec!(100)), Side::Sell, i64::MAX, dec!(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(q) if q == i64::MAX));

        let err = plan_fill(START, held(i64::MAX, dec!(1)), Side::Buy, 1, dec!(0.01)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(1)));
    }

    #[test]
    fn test_notional_overflow_rejected() {
        let err = plan_fill(START, None, Side::Buy, i64::MAX, Decimal::MAX).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(q) if q == i64::MAX));
    }
}
