use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use super::ApiResponse;
use crate::api::auth::AuthUser;
use crate::api::extract::{ApiPath, ApiQuery};
use crate::db::order_repo::OrderFilter;
use crate::db::transaction_repo::TransactionFilter;
use crate::errors::AppError;
use crate::models::{StockOrder, Transaction};
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> Result<Json<ApiResponse<Vec<StockOrder>>>, AppError> {
    let orders = state.engine.list_orders(user_id, &filter).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

pub async fn cancel(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<StockOrder>>, AppError> {
    let order = state.engine.cancel_order(user_id, order_id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

pub async fn history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(filter): ApiQuery<TransactionFilter>,
) -> Result<Json<ApiResponse<Vec<Transaction>>>, AppError> {
    let transactions = state.engine.history(user_id, &filter).await?;
    Ok(Json(ApiResponse::ok(transactions)))
}
