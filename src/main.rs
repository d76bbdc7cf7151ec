use std::sync::Arc;

use paper_ledger::analytics::RiskAnalyzer;
use paper_ledger::api::router::create_router;
use paper_ledger::config::{AppConfig, LogFormat};
use paper_ledger::db;
use paper_ledger::ledger::TradeEngine;
use paper_ledger::market::{CachedPriceFeed, PgPriceFeed, PriceFeed};
use paper_ledger::metrics::init_metrics;
use paper_ledger::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let db = db::init_pool(
        &config.database_url,
        config.db_max_connections,
        config.db_acquire_timeout,
    )
    .await?;
    db::migrate(&db).await?;
    tracing::info!(max_connections = config.db_max_connections, "Database connected");

    let metrics_handle = init_metrics()?;

    // --- Price feed: raw for trades, cached + retried for reads ---
    let live_feed: Arc<dyn PriceFeed> = Arc::new(PgPriceFeed::new(db.clone()));
    let read_feed: Arc<dyn PriceFeed> = Arc::new(CachedPriceFeed::new(
        live_feed.clone(),
        config.cache_settings(),
    ));

    let engine = TradeEngine::new(
        db.clone(),
        live_feed,
        read_feed.clone(),
        config.ledger_settings(),
    );
    let analyzer = RiskAnalyzer::new(read_feed, config.risk_lookback_days);

    tracing::info!(
        starting_balance = %config.starting_balance,
        price_timeout_ms = config.price_feed_timeout.as_millis() as u64,
        auth = config.api_token.is_some(),
        "Ledger ready"
    );

    let state = AppState {
        db,
        config,
        engine: Arc::new(engine),
        analyzer: Arc::new(analyzer),
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}
