//! Admin analytics endpoints.

use axum::extract::{Query, State};
use axum::Json;
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::AnalyticsQuery;
use crate::models::CustomerAnalytics;
use crate::startup::AppState;

pub async fn customer_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<CustomerAnalytics>, AppError> {
    query.validate()?;
    Ok(Json(state.ledger.customer_analytics(query.top()).await))
}
