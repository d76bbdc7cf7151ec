use thiserror::Error;

use crate::market::FeedError;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("portfolio cannot be empty")]
    EmptyPortfolio,

    #[error("stocks not found: {}", .0.join(", "))]
    StocksNotFound(Vec<String>),

    #[error("insufficient price history for the requested holdings")]
    InsufficientData,

    #[error("not enough overlapping data points")]
    InsufficientOverlap,

    #[error(transparent)]
    PriceFeed(#[from] FeedError),
}

impl AnalyticsError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::EmptyPortfolio => "EmptyPortfolio",
            AnalyticsError::StocksNotFound(_) => "StocksNotFound",
            AnalyticsError::InsufficientData => "InsufficientData",
            AnalyticsError::InsufficientOverlap => "InsufficientOverlap",
            AnalyticsError::PriceFeed(e) => e.kind(),
        }
    }
}
