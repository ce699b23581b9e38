mod common;

use common::*;
use rent_ledger_service::config::RazorpayConfig;
use rent_ledger_service::services::{GatewayError, PaymentGateway, RazorpayClient};
use secrecy::Secret;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> RazorpayClient {
    RazorpayClient::new(RazorpayConfig {
        key_id: TEST_KEY_ID.to_string(),
        key_secret: Secret::new(TEST_KEY_SECRET.to_string()),
        webhook_secret: Secret::new(TEST_WEBHOOK_SECRET.to_string()),
        api_base_url: server.uri(),
        timeout_seconds: 1,
    })
    .expect("Failed to build Razorpay client")
}

#[tokio::test]
async fn creates_order_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header(
            "authorization",
            "Basic cnpwX3Rlc3Rfa2V5OnRlc3Rfa2V5X3NlY3JldA==",
        ))
        .and(body_partial_json(json!({
            "amount": 2_150_000,
            "currency": "INR",
            "receipt": "rent_1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_abc",
            "entity": "order",
            "amount": 2_150_000,
            "currency": "INR",
            "receipt": "rent_1",
            "status": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = client_for(&server)
        .create_order(2_150_000, "INR", "rent_1", json!({ "tenant_id": TENANT_ID }))
        .await
        .unwrap();

    assert_eq!(order.id, "order_abc");
    assert_eq!(order.amount, 2_150_000);
    assert_eq!(order.receipt.as_deref(), Some("rent_1"));
}

#[tokio::test]
async fn error_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Order amount less than minimum amount allowed"
            }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_order(50, "INR", "rent_2", json!({}))
        .await
        .unwrap_err();

    match err {
        GatewayError::Rejected { code, description } => {
            assert_eq!(code, "BAD_REQUEST_ERROR");
            assert!(description.contains("minimum amount"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn unparseable_error_keeps_status_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_order(1_000_000, "INR", "rent_3", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Rejected { ref code, .. } if code == "502"
    ));
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "order_late", "amount": 100, "currency": "INR" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_order(100, "INR", "rent_4", json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.reason(), "transport");
}
