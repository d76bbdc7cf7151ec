use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::error::AnalyticsError;
use super::series::{PriceTable, ReturnTable};
use crate::market::PriceFeed;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const HIGH_CORRELATION: f64 = 0.8;
pub const LOW_DIVERSIFICATION: f64 = 0.7;
pub const HIGH_VOLATILITY_PCT: f64 = 50.0;
const MAX_REPORTED_PAIRS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingInput {
    pub symbol: String,
    #[serde(default)]
    pub qty: i64,
    #[serde(default)]
    pub avg_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Critical,
    Fair,
    Healthy,
}

impl HealthStatus {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s < 40 => HealthStatus::Critical,
            s if s < 70 => HealthStatus::Fair,
            _ => HealthStatus::Healthy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskMetrics {
    pub avg_correlation: f64,
    pub annualized_volatility_avg: Option<f64>,
}

/// Diversification health report. Undefined correlations and volatilities
/// (constant or too-short series) serialize as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub health_score: u32,
    pub status: HealthStatus,
    pub metrics: RiskMetrics,
    pub correlation_matrix: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    pub volatilities: BTreeMap<String, Option<f64>>,
    pub high_correlation_pairs: Vec<String>,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub analyzed_symbols: Vec<String>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

pub struct RiskAnalyzer {
    feed: Arc<dyn PriceFeed>,
    lookback_days: i64,
}

impl RiskAnalyzer {
    pub fn new(feed: Arc<dyn PriceFeed>, lookback_days: i64) -> Self {
        Self {
            feed,
            lookback_days,
        }
    }

    pub async fn analyze(&self, holdings: &[HoldingInput]) -> Result<RiskReport, AnalyticsError> {
        let result = self.run(holdings).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        counter!("risk_analyses_total", "outcome" => outcome).increment(1);

        match &result {
            Ok(report) => tracing::info!(
                symbols = report.analyzed_symbols.len(),
                health_score = report.health_score,
                status = ?report.status,
                "Portfolio risk analyzed"
            ),
            Err(e) => tracing::warn!(kind = e.kind(), error = %e, "Portfolio risk analysis failed"),
        }

        result
    }

    async fn run(&self, holdings: &[HoldingInput]) -> Result<RiskReport, AnalyticsError> {
        if holdings.is_empty() {
            return Err(AnalyticsError::EmptyPortfolio);
        }

        let mut seen = HashSet::new();
        let symbols: Vec<String> = holdings
            .iter()
            .map(|h| h.symbol.trim().to_uppercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();

        let instruments = self.feed.resolve(&symbols).await?;
        if instruments.is_empty() {
            return Err(AnalyticsError::StocksNotFound(symbols));
        }

        let to = Utc::now();
        let from = to - chrono::Duration::days(self.lookback_days);

        let mut series = BTreeMap::new();
        for instrument in &instruments {
            let bars = self.feed.get_history(&instrument.symbol, from, to).await?;
            tracing::debug!(symbol = %instrument.symbol, bars = bars.len(), "History loaded");
            series.insert(instrument.symbol.to_uppercase(), bars);
        }

        let prices = PriceTable::align(&series);
        if prices.is_empty() {
            return Err(AnalyticsError::InsufficientData);
        }

        let returns = prices.daily_returns();
        if returns.is_empty() {
            return Err(AnalyticsError::InsufficientOverlap);
        }

        Ok(build_report(&returns))
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Correlation, volatility and diversification report over aligned returns.
pub fn build_report(returns: &ReturnTable) -> RiskReport {
    let symbols = &returns.symbols;
    let n = symbols.len();

    let mut corr = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = round2(pearson(&returns.columns[i], &returns.columns[j]));
            corr[i][j] = r;
            corr[j][i] = r;
        }
    }

    let vols: Vec<f64> = returns.columns.iter().map(|c| annualized_volatility(c)).collect();

    // Strict upper triangle, column-major so pair order is stable.
    let mut upper = Vec::new();
    let mut high_pairs = Vec::new();
    for j in 0..n {
        for i in 0..j {
            let r = corr[i][j];
            if r.is_nan() {
                continue;
            }
            upper.push(r);
            if r > HIGH_CORRELATION {
                high_pairs.push(format!("{} & {}", symbols[i], symbols[j]));
            }
        }
    }

    // A single holding (or all pairs undefined) moves only with itself.
    let avg_corr = if upper.is_empty() {
        1.0
    } else {
        upper.iter().sum::<f64>() / upper.len() as f64
    };
    let score = ((1.0 - avg_corr) * 100.0).clamp(0.0, 100.0);
    let health_score = score as u32;

    let high_vol: Vec<&str> = symbols
        .iter()
        .zip(&vols)
        .filter(|(_, v)| **v > HIGH_VOLATILITY_PCT)
        .map(|(s, _)| s.as_str())
        .collect();

    let mut risks = Vec::new();
    let mut recommendations = Vec::new();
    high_pairs.truncate(MAX_REPORTED_PAIRS);

    if !high_pairs.is_empty() {
        risks.push(format!(
            "High correlation overlap detected in: {}.",
            high_pairs.join(", ")
        ));
        recommendations.push(
            "Consider replacing one asset in highly correlated pairs with a different sector (e.g. Pharma, IT)."
                .to_string(),
        );
    }
    if avg_corr > LOW_DIVERSIFICATION {
        risks.push("Portfolio moves largely in unison (low diversification).".to_string());
        recommendations
            .push("Broaden exposure across sectors that respond to different drivers.".to_string());
    }
    if !high_vol.is_empty() {
        risks.push(format!("High volatility detected in: {}.", high_vol.join(", ")));
        recommendations.push(format!(
            "Reduce position sizes in {} to limit drawdowns.",
            high_vol.join(", ")
        ));
    }

    let defined_vols: Vec<f64> = vols.iter().copied().filter(|v| !v.is_nan()).collect();
    let vol_avg = if defined_vols.is_empty() {
        None
    } else {
        Some(round2(defined_vols.iter().sum::<f64>() / defined_vols.len() as f64))
    };

    let correlation_matrix = symbols
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let row = symbols
                .iter()
                .enumerate()
                .map(|(j, b)| (b.clone(), defined(corr[i][j])))
                .collect();
            (a.clone(), row)
        })
        .collect();

    let volatilities = symbols
        .iter()
        .zip(&vols)
        .map(|(s, v)| (s.clone(), defined(*v)))
        .collect();

    RiskReport {
        health_score,
        status: HealthStatus::from_score(health_score),
        metrics: RiskMetrics {
            avg_correlation: round2(avg_corr),
            annualized_volatility_avg: vol_avg,
        },
        correlation_matrix,
        volatilities,
        high_correlation_pairs: high_pairs,
        risks,
        recommendations,
        analyzed_symbols: symbols.clone(),
    }
}

/// Sample Pearson correlation. NaN when either series is constant or has
/// fewer than two points.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 || a.len() != b.len() {
        return f64::NAN;
    }
    let cov = a.iter().covariance(b.iter());
    let denom = a.iter().std_dev() * b.iter().std_dev();
    if denom == 0.0 || denom.is_nan() {
        return f64::NAN;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Sample standard deviation of daily returns scaled to a yearly
/// percentage.
pub fn annualized_volatility(daily_returns: &[f64]) -> f64 {
    if daily_returns.len() < 2 {
        return f64::NAN;
    }
    daily_returns.iter().std_dev() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn defined(x: f64) -> Option<f64> {
    (!x.is_nan()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryPriceFeed;
    use chrono::{Days, NaiveDate};
    use rust_decimal_macros::dec;

    fn table(cols: &[(&str, &[f64])]) -> ReturnTable {
        let len = cols[0].1.len();
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        ReturnTable {
            symbols: cols.iter().map(|(s, _)| s.to_string()).collect(),
            dates: (0..len as u64).map(|i| start + Days::new(i)).collect(),
            columns: cols.iter().map(|(_, c)| c.to_vec()).collect(),
        }
    }

    fn holding(symbol: &str) -> HoldingInput {
        HoldingInput {
            symbol: symbol.into(),
            qty: 10,
            avg_price: dec!(100),
        }
    }

    #[test]
    fn test_single_symbol_scores_zero() {
        let report = build_report(&table(&[("INFY", &[0.01, -0.02, 0.015])]));

        assert_eq!(report.metrics.avg_correlation, 1.0);
        assert_eq!(report.health_score, 0);
        assert_eq!(report.status, HealthStatus::Critical);
        assert!(report.high_correlation_pairs.is_empty());
        assert_eq!(report.correlation_matrix["INFY"]["INFY"], Some(1.0));
    }

    #[test]
    fn test_identical_series_flagged() {
        let r = [0.01, -0.02, 0.015, 0.003];
        let report = build_report(&table(&[("HDFC", &r), ("ICICI", &r)]));

        assert_eq!(report.correlation_matrix["HDFC"]["ICICI"], Some(1.0));
        assert_eq!(report.high_correlation_pairs, vec!["HDFC & ICICI"]);
        assert_eq!(report.health_score, 0);
        assert!(report.risks.iter().any(|r| r.contains("low diversification")));
        assert_eq!(report.recommendations.len(), 2);
    }

    #[test]
    fn test_opposite_series_score_clamped_to_hundred() {
        let up = [0.01, -0.02, 0.015, 0.003];
        let down: Vec<f64> = up.iter().map(|x| -x).collect();
        let report = build_report(&table(&[("A", &up), ("B", &down)]));

        assert_eq!(report.metrics.avg_correlation, -1.0);
        assert_eq!(report.health_score, 100);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.risks.is_empty());
    }

    #[test]
    fn test_constant_series_has_undefined_correlation() {
        let flat = [0.0, 0.0, 0.0];
        let moving = [0.01, -0.01, 0.02];
        let report = build_report(&table(&[("FLAT", &flat), ("MOVE", &moving)]));

        assert_eq!(report.correlation_matrix["FLAT"]["MOVE"], None);
        assert_eq!(report.volatilities["FLAT"], Some(0.0));
        // No defined pair: treated like a single holding.
        assert_eq!(report.metrics.avg_correlation, 1.0);
    }

    #[test]
    fn test_high_pairs_capped_at_three() {
        let r = [0.01, -0.02, 0.015, 0.003];
        let report = build_report(&table(&[("A", &r), ("B", &r), ("C", &r), ("D", &r)]));

        // Column-major upper triangle: (A,B), (A,C), (B,C), ...
        assert_eq!(report.high_correlation_pairs, vec!["A & B", "A & C", "B & C"]);
    }

    #[test]
    fn test_high_volatility_flagged() {
        let wild = [0.10, -0.10, 0.10, -0.10];
        let report = build_report(&table(&[("WILD", &wild)]));

        let vol = report.volatilities["WILD"].unwrap();
        assert!(vol > HIGH_VOLATILITY_PCT);
        assert!(report.risks.iter().any(|r| r.contains("WILD")));
    }

    #[test]
    fn test_health_status_boundaries() {
        assert_eq!(HealthStatus::from_score(39), HealthStatus::Critical);
        assert_eq!(HealthStatus::from_score(40), HealthStatus::Fair);
        assert_eq!(HealthStatus::from_score(69), HealthStatus::Fair);
        assert_eq!(HealthStatus::from_score(70), HealthStatus::Healthy);
    }

    fn seed_history(feed: &InMemoryPriceFeed, symbol: &str, token: i64, closes: &[i64]) {
        let today = Utc::now().date_naive();
        let points: Vec<(NaiveDate, Decimal)> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| (today - Days::new((closes.len() - i) as u64), Decimal::from(*c)))
            .collect();
        feed.set_history(symbol, token, &points);
    }

    #[tokio::test]
    async fn test_analyze_empty_holdings() {
        let analyzer = RiskAnalyzer::new(Arc::new(InMemoryPriceFeed::new()), 365);
        let err = analyzer.analyze(&[]).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptyPortfolio));
    }

    #[tokio::test]
    async fn test_analyze_unknown_symbols() {
        let analyzer = RiskAnalyzer::new(Arc::new(InMemoryPriceFeed::new()), 365);
        let err = analyzer.analyze(&[holding("nope")]).await.unwrap_err();
        assert_eq!(err.kind(), "StocksNotFound");
    }

    #[tokio::test]
    async fn test_analyze_single_day_is_insufficient_overlap() {
        let feed = Arc::new(InMemoryPriceFeed::new());
        seed_history(&feed, "INFY", 1, &[100]);
        let analyzer = RiskAnalyzer::new(feed, 365);

        let err = analyzer.analyze(&[holding("INFY")]).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientOverlap));
    }

    #[tokio::test]
    async fn test_analyze_drops_unresolved_symbols() {
        let feed = Arc::new(InMemoryPriceFeed::new());
        seed_history(&feed, "INFY", 1, &[100, 102, 101, 105]);
        seed_history(&feed, "TCS", 2, &[200, 198, 203, 201]);
        let analyzer = RiskAnalyzer::new(feed, 365);

        let report = analyzer
            .analyze(&[holding("infy"), holding("TCS"), holding("GHOST"), holding("Infy")])
            .await
            .unwrap();

        assert_eq!(report.analyzed_symbols, vec!["INFY", "TCS"]);
        assert!(report.correlation_matrix["INFY"]["TCS"].is_some());
    }
}
