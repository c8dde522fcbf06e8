//! Monthly bill endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;
use validator::Validate;

use crate::dtos::{
    BillResponse, GenerateBillsRequest, GenerateBillsResponse, ListBillsQuery, PayBillRequest,
    PayBillResponse,
};
use crate::models::{ListBillsFilter, MonthlyBill};
use crate::services::ledger::Ledger;
use crate::startup::AppState;

fn bill_response(ledger: &Ledger, bill: MonthlyBill, now: DateTime<Utc>) -> BillResponse {
    BillResponse {
        effective_status: bill.effective_status(now),
        overdue_fee: ledger.overdue_fee_for(&bill, now),
        bill,
    }
}

/// Generate bills for one month, optionally for a single customer.
#[tracing::instrument(skip(state, request_id, request))]
pub async fn generate_bills(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<GenerateBillsRequest>,
) -> Result<(StatusCode, Json<GenerateBillsResponse>), AppError> {
    request.validate()?;

    tracing::info!(
        request_id = %request_id.0,
        month = request.month,
        year = request.year,
        customer_id = ?request.customer_id,
        "Generating monthly bills"
    );

    let outcome = state
        .ledger
        .generate_bills(request.month, request.year, request.customer_id)
        .await?;

    let status = if outcome.bills.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let errors = (!outcome.errors.is_empty()).then_some(outcome.errors);

    Ok((
        status,
        Json(GenerateBillsResponse {
            total_bills: outcome.bills.len(),
            bills: outcome.bills,
            errors,
        }),
    ))
}

pub async fn list_bills(
    State(state): State<AppState>,
    Query(query): Query<ListBillsQuery>,
) -> Result<Json<Vec<BillResponse>>, AppError> {
    let now = Utc::now();
    let filter = ListBillsFilter::from(query);
    let bills = state.ledger.list_bills_at(&filter, now).await;

    Ok(Json(
        bills
            .into_iter()
            .map(|b| bill_response(&state.ledger, b, now))
            .collect(),
    ))
}

pub async fn get_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<String>,
) -> Result<Json<BillResponse>, AppError> {
    let bill = state.ledger.get_bill(&bill_id).await?;
    Ok(Json(bill_response(&state.ledger, bill, Utc::now())))
}

/// Record a payment against a bill.
#[tracing::instrument(skip(state, request_id, request))]
pub async fn pay_bill(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(bill_id): Path<String>,
    Json(request): Json<PayBillRequest>,
) -> Result<Json<PayBillResponse>, AppError> {
    request.validate()?;

    tracing::info!(
        request_id = %request_id.0,
        bill_id = %bill_id,
        amount = ?request.amount,
        "Recording payment"
    );

    let (payment, updated_bill) = state
        .ledger
        .record_payment(&bill_id, request.into())
        .await?;

    Ok(Json(PayBillResponse {
        payment,
        updated_bill,
    }))
}
