use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_auth;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes, no authentication required
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Protected API routes: Bearer token when API_TOKEN is set, caller
    // identity from the x-user-id header
    let protected = Router::new()
        // Paper trading
        .route("/api/paper-trading/trade", post(handlers::trading::trade))
        .route("/api/paper-trading/portfolio", get(handlers::trading::portfolio))
        .route("/api/paper-trading/reset", post(handlers::trading::reset))
        // Orders & history
        .route("/api/paper-trading/orders", get(handlers::orders::list))
        .route("/api/paper-trading/orders/:id/cancel", post(handlers::orders::cancel))
        .route("/api/paper-trading/history", get(handlers::orders::history))
        // Risk analytics
        .route("/api/portfolio/analyze", post(handlers::analytics::analyze))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
