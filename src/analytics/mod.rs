pub mod error;
pub mod risk;
pub mod series;

pub use error::AnalyticsError;
pub use risk::{HealthStatus, HoldingInput, RiskAnalyzer, RiskMetrics, RiskReport};
pub use series::{PriceTable, ReturnTable};
