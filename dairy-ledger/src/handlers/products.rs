//! Product catalog endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::models::Product;
use crate::startup::AppState;

pub async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.catalog.list().to_vec())
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.get(id)?.clone()))
}
