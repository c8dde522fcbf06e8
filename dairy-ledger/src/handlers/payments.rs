//! Payment history and dues endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{DuesQuery, ListPaymentsQuery};
use crate::models::{DuesSummary, ListPaymentsFilter, Payment};
use crate::startup::AppState;

pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let filter = ListPaymentsFilter::from(query);
    Ok(Json(state.ledger.list_payments(&filter).await))
}

pub async fn dues_summary(
    State(state): State<AppState>,
    Query(query): Query<DuesQuery>,
) -> Result<Json<DuesSummary>, AppError> {
    Ok(Json(state.ledger.dues_summary(query.customer_id).await))
}
