//! Wallet endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::WalletMovementRequest;
use crate::models::{Wallet, WalletTransaction};
use crate::startup::AppState;

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Wallet>, AppError> {
    Ok(Json(state.wallets.get_wallet(&user_id).await))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<WalletTransaction>>, AppError> {
    Ok(Json(state.wallets.transactions(&user_id).await))
}

#[tracing::instrument(skip(state, request))]
pub async fn credit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<WalletMovementRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>), AppError> {
    request.validate()?;
    let transaction = state
        .wallets
        .credit(&user_id, request.amount, request.details())
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

#[tracing::instrument(skip(state, request))]
pub async fn debit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<WalletMovementRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>), AppError> {
    request.validate()?;
    let transaction = state
        .wallets
        .debit(&user_id, request.amount, request.details())
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}
