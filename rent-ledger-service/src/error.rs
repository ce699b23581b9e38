use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Payment schedule already exists for tenant {tenant_id} and property {property_id}")]
    DuplicateSchedule {
        tenant_id: String,
        property_id: String,
    },

    #[error("No unpaid records selected")]
    NoEligibleRecords,

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment signature verification failed")]
    InvalidSignature,

    #[error("No payment records found for order {0}")]
    OrderNotFound(String),

    #[error("Payment record not found: {0}")]
    RecordNotFound(String),

    #[error("Order {0} is still in progress for the selected records")]
    OrderInProgress(String),

    #[error("Payment record {0} is already paid")]
    AlreadySettled(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }
}

impl From<mongodb::error::Error> for LedgerError {
    fn from(err: mongodb::error::Error) -> Self {
        LedgerError::Storage(anyhow::Error::new(err))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::DuplicateSchedule { .. }
            | LedgerError::OrderInProgress(_)
            | LedgerError::AlreadySettled(_) => AppError::Conflict(anyhow::anyhow!(message)),
            LedgerError::NoEligibleRecords => {
                AppError::UnprocessableEntity(anyhow::anyhow!(message))
            }
            LedgerError::GatewayUnavailable(_) => {
                AppError::ServiceUnavailable(anyhow::anyhow!(message))
            }
            LedgerError::InvalidSignature | LedgerError::Validation(_) => {
                AppError::BadRequest(anyhow::anyhow!(message))
            }
            LedgerError::OrderNotFound(_) | LedgerError::RecordNotFound(_) => {
                AppError::NotFound(anyhow::anyhow!(message))
            }
            LedgerError::Authorization(_) => AppError::Forbidden(anyhow::anyhow!(message)),
            LedgerError::Storage(e) => AppError::DatabaseError(e),
        }
    }
}
