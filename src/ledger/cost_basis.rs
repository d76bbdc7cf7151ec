//! Average-price bookkeeping for a signed position.
//!
//! Every fill is classified into exactly one [`Transition`]; each transition
//! has a single rule for the resulting quantity and cost basis.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Side;

/// Decimal places kept on a stored `avg_price`.
pub const AVG_PRICE_SCALE: u32 = 6;

/// Signed open exposure in one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holding {
    pub quantity: i64,
    pub avg_price: Decimal,
}

/// A fill whose resulting quantity or notional cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("position size out of range")]
pub struct SizeOverflow;

impl Holding {
    pub const FLAT: Holding = Holding {
        quantity: 0,
        avg_price: Decimal::ZERO,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// No exposure before the fill.
    Open,
    ExtendLong,
    ReduceLong,
    FlipToShort,
    ExtendShort,
    ReduceShort,
    FlipToLong,
    /// Exposure returns to exactly zero.
    Close,
}

impl Transition {
    /// Classify a fill of signed size `delta` against `old_qty`.
    pub fn classify(old_qty: i64, delta: i64) -> Result<Self, SizeOverflow> {
        let new_qty = old_qty.checked_add(delta).ok_or(SizeOverflow)?;
        if new_qty == 0 {
            return Ok(Transition::Close);
        }
        Ok(match old_qty.signum() {
            0 => Transition::Open,
            1 if delta > 0 => Transition::ExtendLong,
            1 if new_qty > 0 => Transition::ReduceLong,
            1 => Transition::FlipToShort,
            _ if delta < 0 => Transition::ExtendShort,
            _ if new_qty < 0 => Transition::ReduceShort,
            _ => Transition::FlipToLong,
        })
    }

    /// Resulting holding, or `None` when the position is closed.
    ///
    /// - open / flip: basis resets to the fill price
    /// - extend: quantity-weighted average of old basis and fill
    /// - reduce: basis unchanged
    pub fn apply(
        self,
        old: Holding,
        delta: i64,
        price: Decimal,
    ) -> Result<Option<Holding>, SizeOverflow> {
        let quantity = old.quantity.checked_add(delta).ok_or(SizeOverflow)?;
        let avg_price = match self {
            Transition::Close => return Ok(None),
            Transition::Open | Transition::FlipToShort | Transition::FlipToLong => price,
            Transition::ExtendLong | Transition::ExtendShort => {
                let old_notional = Decimal::from(old.quantity.unsigned_abs())
                    .checked_mul(old.avg_price)
                    .ok_or(SizeOverflow)?;
                let fill_notional = Decimal::from(delta.unsigned_abs())
                    .checked_mul(price)
                    .ok_or(SizeOverflow)?;
                old_notional
                    .checked_add(fill_notional)
                    .and_then(|n| n.checked_div(Decimal::from(quantity.unsigned_abs())))
                    .ok_or(SizeOverflow)?
                    .round_dp(AVG_PRICE_SCALE)
            }
            Transition::ReduceLong | Transition::ReduceShort => old.avg_price,
        };
        Ok(Some(Holding {
            quantity,
            avg_price,
        }))
    }
}

/// Signed quantity change for a fill.
pub fn signed_delta(side: Side, quantity: i64) -> i64 {
    match side {
        Side::Buy => quantity,
        Side::Sell => -quantity,
    }
}
