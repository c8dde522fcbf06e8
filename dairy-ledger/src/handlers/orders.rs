//! Order endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{CreateOrderRequest, ListOrdersQuery, UpdateOrderRequest};
use crate::models::{ListOrdersFilter, Order};
use crate::startup::AppState;

#[tracing::instrument(skip(state, request), fields(customer_id = request.customer_id))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    request.validate()?;
    let order = state.ledger.create_order(request.into()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let filter = ListOrdersFilter::from(query);
    Ok(Json(state.ledger.list_orders(&filter).await))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.ledger.get_order(id).await?))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.ledger.update_order_status(id, request.status).await?;
    Ok(Json(order))
}
