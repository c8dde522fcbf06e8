//! Inventory endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{CreateInventoryRequest, LowStockQuery, UpdateInventoryRequest};
use crate::models::InventoryItem;
use crate::startup::AppState;

pub async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<InventoryItem>>, AppError> {
    Ok(Json(state.inventory.list_items().await))
}

pub async fn add_item(
    State(state): State<AppState>,
    Json(request): Json<CreateInventoryRequest>,
) -> Result<(StatusCode, Json<InventoryItem>), AppError> {
    request.validate()?;
    let item = state.inventory.add_item(request.into()).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<UpdateInventoryRequest>,
) -> Result<Json<InventoryItem>, AppError> {
    let item = state.inventory.update_quantity(id, request.quantity).await?;
    Ok(Json(item))
}

pub async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<InventoryItem>>, AppError> {
    Ok(Json(state.inventory.low_stock(query.threshold).await))
}
