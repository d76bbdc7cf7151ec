use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::analytics::{HoldingInput, RiskReport};
use crate::api::extract::ApiJson;
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub holdings: Vec<HoldingInput>,
}

pub async fn analyze(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AnalyzeRequest>,
) -> Result<Json<RiskReport>, AppError> {
    let report = state.analyzer.analyze(&req.holdings).await?;
    Ok(Json(report))
}
