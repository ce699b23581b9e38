//! Payment ledger handlers: dashboards, gateway checkout and manual
//! settlement.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{
        CreateOrderRequest, MarkPaidRequest, MarkPaidResponse, VerifyPaymentRequest,
        VerifyPaymentResponse,
    },
    error::LedgerError,
    middleware::ActorContext,
    models::PaymentView,
    services::{ledger, OrderSummary, OwnerLedger, TenantLedger},
    startup::AppState,
};

/// Ledger of the calling tenant.
pub async fn tenant_payments(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
) -> Result<Json<TenantLedger>, AppError> {
    if !actor.is_tenant() {
        return Err(LedgerError::authorization("only tenants have a tenant ledger").into());
    }

    let ledger = state
        .engine
        .list_for_tenant(&actor, &actor.id, Utc::now())
        .await?;
    Ok(Json(ledger))
}

/// Ledger of every record the calling owner collects.
pub async fn owner_payments(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
) -> Result<Json<OwnerLedger>, AppError> {
    let ledger = state.engine.list_for_owner(&actor, Utc::now()).await?;
    Ok(Json(ledger))
}

pub async fn get_payment(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    Path(id): Path<String>,
) -> Result<Json<PaymentView>, AppError> {
    let payment = state.engine.get_record(&actor, &id, Utc::now()).await?;
    Ok(Json(payment))
}

/// Create a gateway order for the selected months.
///
/// The client passes the returned `order_id` and `key_id` to Razorpay
/// checkout, then calls `/payments/verify` with the signed result.
pub async fn create_order(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderSummary>), AppError> {
    payload
        .validate()
        .map_err(|e| LedgerError::validation(e.to_string()))?;

    tracing::info!(
        tenant_id = %actor.id,
        payments = payload.payment_ids.len(),
        "Creating rent order"
    );

    let order = state
        .engine
        .create_order(&actor, &payload.payment_ids, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// Verify the checkout signature and settle the order's records.
pub async fn verify_payment(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    payload
        .validate()
        .map_err(|e| LedgerError::validation(e.to_string()))?;

    tracing::info!(
        razorpay_order_id = %payload.razorpay_order_id,
        razorpay_payment_id = %payload.razorpay_payment_id,
        user_id = %actor.id,
        "Verifying Razorpay payment"
    );

    let now = Utc::now();
    let records = state
        .engine
        .verify_and_settle(
            &payload.razorpay_order_id,
            &payload.razorpay_payment_id,
            &payload.razorpay_signature,
            now,
        )
        .await?;

    let today = now.date_naive();
    Ok(Json(VerifyPaymentResponse {
        message: "Payment verified successfully".to_string(),
        payments: records
            .iter()
            .map(|r| ledger::view(r, state.engine.policy(), today))
            .collect(),
    }))
}

/// Owner records a cash or bank transfer payment.
pub async fn mark_paid(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    Path(id): Path<String>,
    Json(payload): Json<MarkPaidRequest>,
) -> Result<Json<MarkPaidResponse>, AppError> {
    payload
        .validate()
        .map_err(|e| LedgerError::validation(e.to_string()))?;

    let now = Utc::now();
    let record = state
        .engine
        .mark_manually_paid(&actor, &id, payload.payment_method, payload.notes, now)
        .await?;

    Ok(Json(MarkPaidResponse {
        message: "Payment marked as paid".to_string(),
        payment: ledger::view(&record, state.engine.policy(), now.date_naive()),
    }))
}
