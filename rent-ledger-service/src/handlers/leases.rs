use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{GenerateScheduleRequest, GenerateScheduleResponse},
    error::LedgerError,
    middleware::ActorContext,
    services::ledger,
    startup::AppState,
};

/// Generate the monthly payment schedule for a new lease.
pub async fn generate_schedule(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    Json(payload): Json<GenerateScheduleRequest>,
) -> Result<(StatusCode, Json<GenerateScheduleResponse>), AppError> {
    payload
        .validate()
        .map_err(|e| LedgerError::validation(e.to_string()))?;

    tracing::info!(
        owner_id = %actor.id,
        tenant_id = %payload.tenant_id,
        property_id = %payload.property_id,
        start_date = %payload.start_date,
        end_date = %payload.end_date,
        "Generating payment schedule"
    );

    let now = Utc::now();
    let lease = payload.into_lease(&actor.id);
    let records = state.engine.generate_schedule(&actor, &lease, now).await?;

    let today = now.date_naive();
    let payments: Vec<_> = records
        .iter()
        .map(|r| ledger::view(r, state.engine.policy(), today))
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(GenerateScheduleResponse {
            count: payments.len(),
            payments,
        }),
    ))
}
