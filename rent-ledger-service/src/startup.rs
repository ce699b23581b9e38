//! Application startup and lifecycle management.

use crate::config::Config;
use crate::handlers;
use crate::services::{
    InMemoryPaymentStore, LedgerEngine, MongoPaymentStore, PaymentGateway, PaymentStore,
    RazorpayClient, UnavailableGateway,
};
use axum::{
    middleware::from_fn,
    routing::{get, patch, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: LedgerEngine,
}

/// Build the HTTP router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/leases/schedule", post(handlers::leases::generate_schedule))
        .route("/payments/tenant", get(handlers::payments::tenant_payments))
        .route("/payments/owner", get(handlers::payments::owner_payments))
        .route("/payments/orders", post(handlers::payments::create_order))
        .route("/payments/verify", post(handlers::payments::verify_payment))
        .route("/payments/:id", get(handlers::payments::get_payment))
        .route("/payments/:id/mark-paid", patch(handlers::payments::mark_paid))
        .route("/webhooks/razorpay", post(handlers::webhooks::razorpay_webhook))
        .route_layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    user_id = tracing::field::Empty,
                    role = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with MongoDB storage and, when credentials are
    /// configured, the Razorpay gateway.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret())
            .await
            .map_err(|e| {
                tracing::error!("Failed to parse MongoDB connection string: {}", e);
                AppError::from(e)
            })?;
        client_options.app_name = Some(config.service_name.clone());

        let client = Client::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::from(e)
        })?;

        let store = MongoPaymentStore::new(&client, &config.database.db_name);
        store.init_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            AppError::from(e)
        })?;

        let gateway = gateway_from_config(&config)?;

        Self::build_with(config, Arc::new(store), gateway).await
    }

    /// Build the application over an in-memory store. Records are lost on
    /// restart.
    pub async fn build_in_memory(config: Config) -> Result<Self, AppError> {
        tracing::warn!("Using in-memory payment store");
        let gateway = gateway_from_config(&config)?;
        Self::build_with(config, Arc::new(InMemoryPaymentStore::new()), gateway).await
    }

    /// Build the application over explicit store and gateway implementations.
    pub async fn build_with(
        config: Config,
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, AppError> {
        let engine = LedgerEngine::new(store, gateway, &config.ledger);
        let state = AppState { engine };

        // Port 0 = random port for testing
        let http_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid listen address: {}", e))
            })?;
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Rent ledger service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = router(self.state);
        axum::serve(self.http_listener, router).await
    }
}

fn gateway_from_config(config: &Config) -> Result<Arc<dyn PaymentGateway>, AppError> {
    if !config.razorpay.is_configured() {
        tracing::warn!("Razorpay credentials not configured - online payments are disabled");
        return Ok(Arc::new(UnavailableGateway));
    }

    let client = RazorpayClient::new(config.razorpay.clone())
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
    tracing::info!("Razorpay client initialized");
    Ok(Arc::new(client))
}
