#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rent_ledger_service::config::{
    Config, DatabaseConfig, LedgerConfig, ObservabilityConfig, RazorpayConfig, ServerConfig,
};
use rent_ledger_service::models::Lease;
use rent_ledger_service::services::{
    GatewayError, GatewayOrder, InMemoryPaymentStore, LedgerEngine, PaymentGateway,
};
use rent_ledger_service::startup::Application;
use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::utils::signature::{hmac_sha256_hex, verify_hmac_sha256_hex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_KEY_ID: &str = "rzp_test_key";
pub const TEST_KEY_SECRET: &str = "test_key_secret";
pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";
pub const OWNER_ID: &str = "owner-1";
pub const TENANT_ID: &str = "tenant-1";
pub const PROPERTY_ID: &str = "property-1";

/// Deterministic gateway: order ids count up and signatures use
/// `TEST_KEY_SECRET`.
#[derive(Default)]
pub struct FakeGateway {
    orders: AtomicU64,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn orders_created(&self) -> u64 {
        self.orders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn is_available(&self) -> bool {
        true
    }

    fn key_id(&self) -> Option<String> {
        Some(TEST_KEY_ID.to_string())
    }

    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        receipt: &str,
        _notes: serde_json::Value,
    ) -> Result<GatewayOrder, GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }

        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayOrder {
            id: format!("order_test_{}", n),
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        })
    }

    fn verify_payment_signature(
        &self,
        order_id: &str,
        transaction_id: &str,
        signature: &str,
    ) -> Result<bool, GatewayError> {
        verify_hmac_sha256_hex(
            TEST_KEY_SECRET,
            &format!("{}|{}", order_id, transaction_id),
            signature,
        )
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    fn verify_webhook_signature(&self, body: &str, signature: &str) -> Result<bool, GatewayError> {
        verify_hmac_sha256_hex(TEST_WEBHOOK_SECRET, body, signature)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

/// Checkout signature for `order_id` and `payment_id`.
pub fn sign(order_id: &str, payment_id: &str) -> String {
    hmac_sha256_hex(TEST_KEY_SECRET, &format!("{}|{}", order_id, payment_id))
        .expect("Failed to sign payment")
}

pub fn sign_webhook(body: &str) -> String {
    hmac_sha256_hex(TEST_WEBHOOK_SECRET, body).expect("Failed to sign webhook")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

pub fn lease(start: NaiveDate, end: NaiveDate) -> Lease {
    Lease {
        tenant_id: TENANT_ID.to_string(),
        property_id: PROPERTY_ID.to_string(),
        owner_id: OWNER_ID.to_string(),
        start_date: start,
        end_date: end,
        monthly_rent: Decimal::from(10_000),
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
        },
        database: DatabaseConfig {
            url: Secret::new("memory://".to_string()),
            db_name: "rent_ledger_test".to_string(),
        },
        razorpay: RazorpayConfig {
            key_id: TEST_KEY_ID.to_string(),
            key_secret: Secret::new(TEST_KEY_SECRET.to_string()),
            webhook_secret: Secret::new(TEST_WEBHOOK_SECRET.to_string()),
            api_base_url: "https://api.razorpay.com/v1".to_string(),
            timeout_seconds: 1,
        },
        ledger: LedgerConfig {
            gateway_timeout_seconds: 1,
            ..LedgerConfig::default()
        },
        observability: ObservabilityConfig {
            log_level: "debug".to_string(),
            otlp_endpoint: None,
        },
        service_name: "rent-ledger-service-test".to_string(),
    }
}

/// Engine over a fresh in-memory store.
pub struct TestLedger {
    pub engine: LedgerEngine,
    pub store: Arc<InMemoryPaymentStore>,
    pub gateway: Arc<FakeGateway>,
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_gateway(FakeGateway::new())
    }

    pub fn with_gateway(gateway: FakeGateway) -> Self {
        let store = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(gateway);
        let engine = LedgerEngine::new(store.clone(), gateway.clone(), &test_config().ledger);
        Self {
            engine,
            store,
            gateway,
        }
    }
}

pub struct TestApp {
    pub http_address: String,
    pub http_port: u16,
    pub store: Arc<InMemoryPaymentStore>,
    pub gateway: Arc<FakeGateway>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_gateway(FakeGateway::new()).await
    }

    pub async fn spawn_with_gateway(gateway: FakeGateway) -> Self {
        let store = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(gateway);

        let app = Application::build_with(test_config(), store.clone(), gateway.clone())
            .await
            .expect("Failed to build test application");

        let http_port = app.http_port();
        let http_address = format!("http://127.0.0.1:{}", http_port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", http_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            http_address,
            http_port,
            store,
            gateway,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.http_address, path)
    }

    /// Request builder carrying the BFF identity headers.
    pub fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        user_id: &str,
        role: &str,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("X-User-ID", user_id)
            .header("X-User-Role", role)
    }

    pub fn as_owner(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.request(method, path, OWNER_ID, "owner")
    }

    pub fn as_tenant(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.request(method, path, TENANT_ID, "tenant")
    }
}
