//! Razorpay payment gateway client.
//!
//! Implements Razorpay's Orders API for rent collection and the signature
//! checks for checkout confirmations and webhooks.

use crate::config::RazorpayConfig;
use crate::services::gateway::{GatewayError, GatewayOrder, PaymentGateway};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::utils::signature::verify_hmac_sha256_hex;
use std::time::Duration;

/// Razorpay client for interacting with the Razorpay API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

/// Request to create a Razorpay order.
#[derive(Debug, Serialize)]
pub struct CreateOrderRequest<'a> {
    /// Amount in smallest currency unit (paise for INR).
    pub amount: u64,
    pub currency: &'a str,
    pub receipt: &'a str,
    pub notes: serde_json::Value,
}

/// Response from Razorpay order creation.
#[derive(Debug, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Razorpay API error response.
#[derive(Debug, Deserialize)]
pub struct RazorpayError {
    pub error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayErrorDetail {
    pub code: String,
    pub description: String,
}

/// Razorpay webhook event. Only the fields the ledger logs are kept.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<WebhookPaymentEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPaymentEntity {
    pub entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl WebhookEvent {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn payment(&self) -> Option<&PaymentEntity> {
        self.payload.payment.as_ref().map(|p| &p.entity)
    }
}

impl RazorpayClient {
    /// Create a new Razorpay client whose requests time out after
    /// `config.timeout_seconds`.
    pub fn new(config: RazorpayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    /// Check if Razorpay is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn post_order(&self, request: &CreateOrderRequest<'_>) -> Result<RazorpayOrder, GatewayError> {
        let url = format!("{}/orders", self.config.api_base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, "Razorpay create_order response");

        if status.is_success() {
            let order: RazorpayOrder = serde_json::from_str(&body)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            tracing::info!(
                order_id = %order.id,
                amount = order.amount,
                currency = %order.currency,
                "Razorpay order created"
            );
            Ok(order)
        } else {
            let detail = serde_json::from_str::<RazorpayError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| RazorpayErrorDetail {
                    code: status.as_str().to_string(),
                    description: body.clone(),
                });
            tracing::error!(
                code = %detail.code,
                description = %detail.description,
                "Razorpay order creation failed"
            );
            Err(GatewayError::Rejected {
                code: detail.code,
                description: detail.description,
            })
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn is_available(&self) -> bool {
        self.is_configured()
    }

    fn key_id(&self) -> Option<String> {
        self.is_configured().then(|| self.config.key_id.clone())
    }

    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        receipt: &str,
        notes: serde_json::Value,
    ) -> Result<GatewayOrder, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let order = self
            .post_order(&CreateOrderRequest {
                amount: amount_minor,
                currency,
                receipt,
                notes,
            })
            .await?;

        Ok(GatewayOrder {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
            receipt: order.receipt,
        })
    }

    /// The signature is `HMAC-SHA256(order_id + "|" + payment_id, key_secret)`.
    fn verify_payment_signature(
        &self,
        order_id: &str,
        transaction_id: &str,
        signature: &str,
    ) -> Result<bool, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let payload = format!("{}|{}", order_id, transaction_id);
        let is_valid =
            verify_hmac_sha256_hex(self.config.key_secret.expose_secret(), &payload, signature)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if is_valid {
            tracing::info!(
                order_id = %order_id,
                payment_id = %transaction_id,
                "Payment signature verified successfully"
            );
        } else {
            tracing::warn!(
                order_id = %order_id,
                payment_id = %transaction_id,
                "Payment signature verification failed"
            );
        }

        Ok(is_valid)
    }

    /// The signature is `HMAC-SHA256(request_body, webhook_secret)`.
    fn verify_webhook_signature(&self, body: &str, signature: &str) -> Result<bool, GatewayError> {
        let secret = self.config.webhook_secret.expose_secret();
        if secret.is_empty() {
            return Err(GatewayError::NotConfigured);
        }

        let is_valid = verify_hmac_sha256_hex(secret, body, signature)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }
}
