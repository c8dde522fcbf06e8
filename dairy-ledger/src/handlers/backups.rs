//! Backup endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;

use crate::services::BackupInfo;
use crate::startup::AppState;

pub async fn list_backups(State(state): State<AppState>) -> Result<Json<Vec<BackupInfo>>, AppError> {
    Ok(Json(state.backups.list_backups().await?))
}

pub async fn create_backup(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<BackupInfo>), AppError> {
    let backup = state.backups.create_backup().await?;
    Ok((StatusCode::CREATED, Json(backup)))
}

#[tracing::instrument(skip(state, request_id))]
pub async fn restore_backup(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> Result<Json<BackupInfo>, AppError> {
    tracing::warn!(request_id = %request_id.0, backup = %name, "Restoring backup over live data");
    Ok(Json(state.backups.restore_backup(&name).await?))
}
