//! Date alignment and daily returns over close-price series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;

use crate::market::Bar;

/// Close prices aligned on a shared date axis, one column per symbol.
/// Symbols are kept in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    pub symbols: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// `columns[s][d]` is the close of `symbols[s]` on `dates[d]`.
    pub columns: Vec<Vec<f64>>,
}

/// Daily percentage returns, rows with any undefined value removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTable {
    pub symbols: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<Vec<f64>>,
}

impl ReturnTable {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl PriceTable {
    /// Align every non-empty series on the union of their dates.
    ///
    /// Gaps are forward-filled from the last known close, then any leading
    /// gap is back-filled from the first known close. Symbols with no bars
    /// are left out.
    pub fn align(series: &BTreeMap<String, Vec<Bar>>) -> Self {
        let series: Vec<(&String, BTreeMap<NaiveDate, f64>)> = series
            .iter()
            .filter(|(_, bars)| !bars.is_empty())
            .map(|(symbol, bars)| {
                let closes = bars
                    .iter()
                    .map(|b| (b.date, b.close.to_f64().unwrap_or(f64::NAN)))
                    .collect();
                (symbol, closes)
            })
            .collect();

        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|(_, closes)| closes.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut symbols = Vec::with_capacity(series.len());
        let mut columns = Vec::with_capacity(series.len());

        for (symbol, closes) in &series {
            let mut column: Vec<Option<f64>> = dates.iter().map(|d| closes.get(d).copied()).collect();
            forward_fill(&mut column);
            back_fill(&mut column);

            symbols.push((*symbol).clone());
            columns.push(column.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect());
        }

        Self {
            symbols,
            dates,
            columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// `close[t] / close[t-1] - 1` per symbol. The first row has no
    /// predecessor and is dropped, as is every row where any symbol's
    /// return is NaN or infinite (a zero prior close).
    pub fn daily_returns(&self) -> ReturnTable {
        let mut dates = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); self.symbols.len()];

        for t in 1..self.dates.len() {
            let row: Vec<f64> = self
                .columns
                .iter()
                .map(|col| col[t] / col[t - 1] - 1.0)
                .collect();
            if row.iter().any(|r| !r.is_finite()) {
                continue;
            }
            dates.push(self.dates[t]);
            for (col, r) in columns.iter_mut().zip(row) {
                col.push(r);
            }
        }

        ReturnTable {
            symbols: self.symbols.clone(),
            dates,
            columns,
        }
    }
}

fn forward_fill(column: &mut [Option<f64>]) {
    let mut last = None;
    for v in column.iter_mut() {
        match v {
            Some(x) => last = Some(*x),
            None => *v = last,
        }
    }
}

fn back_fill(column: &mut [Option<f64>]) {
    let mut next = None;
    for v in column.iter_mut().rev() {
        match v {
            Some(x) => next = Some(*x),
            None => *v = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn bars(points: &[(u32, i64)]) -> Vec<Bar> {
        points
            .iter()
            .map(|(day, close)| Bar {
                date: d(*day),
                close: Decimal::from(*close),
            })
            .collect()
    }

    #[test]
    fn test_align_fills_forward_then_backward() {
        let mut series = BTreeMap::new();
        series.insert("TCS".to_string(), bars(&[(3, 30), (5, 50)]));
        series.insert("INFY".to_string(), bars(&[(2, 10), (4, 20)]));

        let table = PriceTable::align(&series);

        assert_eq!(table.symbols, vec!["INFY", "TCS"]);
        assert_eq!(table.dates, vec![d(2), d(3), d(4), d(5)]);
        // INFY: 10 on the 3rd carried forward, 20 held through the 5th.
        assert_eq!(table.columns[0], vec![10.0, 10.0, 20.0, 20.0]);
        // TCS: no close before the 3rd, so the 2nd is back-filled.
        assert_eq!(table.columns[1], vec![30.0, 30.0, 30.0, 50.0]);
    }

    #[test]
    fn test_align_drops_symbols_without_bars() {
        let mut series = BTreeMap::new();
        series.insert("INFY".to_string(), bars(&[(2, 10)]));
        series.insert("GHOST".to_string(), Vec::new());

        let table = PriceTable::align(&series);
        assert_eq!(table.symbols, vec!["INFY"]);
    }

    #[test]
    fn test_returns_drop_first_row() {
        let mut series = BTreeMap::new();
        series.insert("INFY".to_string(), bars(&[(2, 100), (3, 110), (4, 99)]));

        let returns = PriceTable::align(&series).daily_returns();

        assert_eq!(returns.dates, vec![d(3), d(4)]);
        let col = &returns.columns[0];
        assert!((col[0] - 0.10).abs() < 1e-12);
        assert!((col[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_zero_close_skips_infinite_return() {
        let mut series = BTreeMap::new();
        series.insert("INFY".to_string(), bars(&[(2, 100), (3, 0), (4, 50), (5, 55)]));
        series.insert("TCS".to_string(), bars(&[(2, 10), (3, 11), (4, 12), (5, 13)]));

        let returns = PriceTable::align(&series).daily_returns();

        // 100 -> 0 is a finite -100%; 0 -> 50 divides by zero and is dropped.
        assert_eq!(returns.dates, vec![d(3), d(5)]);
        assert!((returns.columns[0][0] + 1.0).abs() < 1e-12);
        assert!((returns.columns[0][1] - 0.10).abs() < 1e-12);
        assert!(returns.columns.iter().flatten().all(|r| r.is_finite()));
    }

    #[test]
    fn test_single_date_has_no_returns() {
        let mut series = BTreeMap::new();
        series.insert("INFY".to_string(), bars(&[(2, 100)]));
        series.insert("TCS".to_string(), bars(&[(2, 200)]));

        assert!(PriceTable::align(&series).daily_returns().is_empty());
    }
}
