use axum::extract::State;
use axum::Json;

use super::ApiResponse;
use crate::api::auth::AuthUser;
use crate::api::extract::ApiJson;
use crate::errors::AppError;
use crate::ledger::{PortfolioView, ResetReceipt, TradeReceipt, TradeRequest};
use crate::AppState;

pub async fn trade(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(req): ApiJson<TradeRequest>,
) -> Result<Json<TradeReceipt>, AppError> {
    let receipt = state.engine.execute_trade(user_id, &req).await?;
    Ok(Json(receipt))
}

pub async fn portfolio(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ApiResponse<PortfolioView>>, AppError> {
    let view = state.engine.portfolio(user_id).await?;
    Ok(Json(ApiResponse::ok(view)))
}

pub async fn reset(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ResetReceipt>, AppError> {
    let receipt = state.engine.reset(user_id).await?;
    Ok(Json(receipt))
}
