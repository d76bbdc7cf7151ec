pub mod analytics;
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod ledger;
pub mod market;
pub mod metrics;
pub mod models;

use std::sync::Arc;

use crate::analytics::RiskAnalyzer;
use crate::config::AppConfig;
use crate::ledger::TradeEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: AppConfig,
    pub engine: Arc<TradeEngine>,
    pub analyzer: Arc<RiskAnalyzer>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
