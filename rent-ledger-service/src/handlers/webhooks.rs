//! Razorpay webhook receiver.
//!
//! Events are verified and logged for reconciliation. Records are only
//! settled through `/payments/verify`.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::{
    services::{razorpay::WebhookEvent, GatewayError},
    startup::AppState,
};

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing X-Razorpay-Signature header");
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    let is_valid = state
        .engine
        .gateway()
        .verify_webhook_signature(&body, signature)
        .map_err(|e| match e {
            GatewayError::NotConfigured => {
                AppError::ServiceUnavailable(anyhow::anyhow!("Webhook secret not configured"))
            }
            other => {
                tracing::error!(error = %other, "Webhook signature verification error");
                AppError::InternalError(anyhow::anyhow!("Webhook verification failed"))
            }
        })?;

    if !is_valid {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let event = WebhookEvent::parse(&body).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse webhook event");
        AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
    })?;

    match (event.event.as_str(), event.payment()) {
        ("payment.captured", Some(payment)) => {
            tracing::info!(
                payment_id = %payment.id,
                order_id = ?payment.order_id,
                amount = payment.amount,
                "Payment captured webhook received"
            );
        }
        ("payment.failed", Some(payment)) => {
            tracing::warn!(
                payment_id = %payment.id,
                order_id = ?payment.order_id,
                reason = ?payment.error_description,
                "Payment failed webhook received"
            );
        }
        (other, _) => {
            tracing::debug!(event_type = %other, "Unhandled webhook event type");
        }
    }

    // Always acknowledge a verified event
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}
