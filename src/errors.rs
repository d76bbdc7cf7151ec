use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::analytics::AnalyticsError;
use crate::ledger::LedgerError;
use crate::market::FeedError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Missing or invalid caller identity")]
    Unauthorized,

}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    kind: &'static str,
    error: String,
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Ledger(e) => e.kind(),
            AppError::Analytics(e) => e.kind(),
            AppError::BadRequest(_) => "BadRequest",
            AppError::Unauthorized => "Unauthorized",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ledger(e) => match e {
                LedgerError::InvalidQuantity(_)
                | LedgerError::InvalidLimitPrice
                | LedgerError::UnsupportedOrderType(_)
                | LedgerError::InstrumentMismatch { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::InsufficientMargin { .. } => StatusCode::BAD_REQUEST,
                LedgerError::StockNotFound(_)
                | LedgerError::OrderNotFound(_)
                | LedgerError::PortfolioNotFound => StatusCode::NOT_FOUND,
                LedgerError::PriceFeed(f) => feed_status(f),
                LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Analytics(e) => match e {
                AnalyticsError::EmptyPortfolio
                | AnalyticsError::InsufficientData
                | AnalyticsError::InsufficientOverlap => StatusCode::BAD_REQUEST,
                AnalyticsError::StocksNotFound(_) => StatusCode::NOT_FOUND,
                AnalyticsError::PriceFeed(f) => feed_status(f),
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

fn feed_status(e: &FeedError) -> StatusCode {
    match e {
        FeedError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        FeedError::Unavailable(_) => StatusCode::BAD_GATEWAY,
        FeedError::Database(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let message = if status.is_server_error() {
            tracing::error!(kind, "Request failed: {self:?}");
            match status {
                StatusCode::GATEWAY_TIMEOUT => "Price feed timed out".to_string(),
                StatusCode::BAD_GATEWAY => "Price feed unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                kind,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Ledger(LedgerError::Database(e))
    }
}

// -----------------------------------------------------------------------
// Extractor rejections
// -----------------------------------------------------------------------

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
