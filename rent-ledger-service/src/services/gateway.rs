use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order created by the external gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor currency units.
    pub amount: u64,
    pub currency: String,
    pub receipt: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway is not configured")]
    NotConfigured,

    #[error("payment gateway request failed: {0}")]
    Transport(String),

    #[error("payment gateway rejected the request: {code} - {description}")]
    Rejected { code: String, description: String },

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Short label used for failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Transport(_) => "transport",
            Self::Rejected { .. } => "rejected",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// External payment gateway: creates orders and checks signed confirmations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn is_available(&self) -> bool;

    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> Option<String>;

    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        receipt: &str,
        notes: serde_json::Value,
    ) -> Result<GatewayOrder, GatewayError>;

    /// Check `signature` against HMAC-SHA256(key secret, "order_id|transaction_id").
    fn verify_payment_signature(
        &self,
        order_id: &str,
        transaction_id: &str,
        signature: &str,
    ) -> Result<bool, GatewayError>;

    /// Check a webhook body against its signature header.
    fn verify_webhook_signature(&self, body: &str, signature: &str) -> Result<bool, GatewayError>;
}

/// Gateway used when no credentials are configured. Every call fails with
/// `NotConfigured`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGateway;

#[async_trait]
impl PaymentGateway for UnavailableGateway {
    fn is_available(&self) -> bool {
        false
    }

    fn key_id(&self) -> Option<String> {
        None
    }

    async fn create_order(
        &self,
        _amount_minor: u64,
        _currency: &str,
        _receipt: &str,
        _notes: serde_json::Value,
    ) -> Result<GatewayOrder, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    fn verify_payment_signature(
        &self,
        _order_id: &str,
        _transaction_id: &str,
        _signature: &str,
    ) -> Result<bool, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    fn verify_webhook_signature(&self, _body: &str, _signature: &str) -> Result<bool, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
