use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(handle)
}

/// Describe every metric and pre-register counters so they appear even
/// before the first increment.
pub fn register_metrics() {
    describe_counter!("trades_executed_total", "Market trades filled, by action");
    describe_counter!("trades_rejected_total", "Trade requests rejected, by error kind");
    describe_counter!("limit_orders_placed_total", "Pending limit orders recorded");
    describe_counter!("orders_cancelled_total", "Pending orders cancelled");
    describe_counter!("portfolio_resets_total", "Portfolios reset to the starting balance");
    describe_counter!("risk_analyses_total", "Risk analyses run, by outcome");
    describe_histogram!(
        "trade_latency_seconds",
        Unit::Seconds,
        "Wall time of successful trade requests"
    );

    counter!("trades_executed_total", "action" => "BUY").absolute(0);
    counter!("trades_executed_total", "action" => "SELL").absolute(0);
    counter!("limit_orders_placed_total").absolute(0);
    counter!("orders_cancelled_total").absolute(0);
    counter!("portfolio_resets_total").absolute(0);

    // Histogram is lazily created on first record; force creation.
    histogram!("trade_latency_seconds").record(0.0);
}
