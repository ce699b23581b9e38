//! The rent-ledger engine: schedule generation, gateway orders, verified
//! settlement and manual settlement.

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::models::{Actor, Lease, PaymentMethod, PaymentRecord, PaymentView, Settlement};
use crate::services::gateway::{GatewayError, PaymentGateway};
use crate::services::ledger::{self, LedgerPolicy};
use crate::services::metrics;
use crate::services::store::{OrderClaim, PaymentStore};
use crate::services::summary::{self, OwnerLedger, TenantLedger};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// One record included in a gateway order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub record_id: String,
    pub month_label: String,
    pub base_amount: Decimal,
    pub late_fee: Decimal,
    pub total_amount: Decimal,
}

/// What the checkout widget needs to collect an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub amount: Decimal,
    pub amount_minor: u64,
    pub currency: String,
    pub receipt: String,
    pub key_id: Option<String>,
    pub records: Vec<OrderLine>,
}

#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    policy: LedgerPolicy,
    currency: String,
    gateway_timeout: Duration,
    order_hold: chrono::Duration,
}

impl LedgerEngine {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            policy: config.policy(),
            currency: config.currency.clone(),
            gateway_timeout: Duration::from_secs(config.gateway_timeout_seconds),
            order_hold: chrono::Duration::minutes(config.order_hold_minutes),
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub async fn ping(&self) -> Result<(), LedgerError> {
        self.store.ping().await
    }

    /// Create one pending record per calendar month of the lease.
    pub async fn generate_schedule(
        &self,
        actor: &Actor,
        lease: &Lease,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentRecord>, LedgerError> {
        if !actor.is_owner() || actor.id != lease.owner_id {
            return Err(LedgerError::authorization(
                "only the property owner can generate a payment schedule",
            ));
        }

        let records = ledger::build_schedule(lease, &self.policy, now)?;
        self.store.insert_schedule(&records).await?;

        metrics::record_schedule_generated();
        tracing::info!(
            tenant_id = %lease.tenant_id,
            property_id = %lease.property_id,
            owner_id = %lease.owner_id,
            months = records.len(),
            "Payment schedule generated"
        );

        Ok(records)
    }

    /// Request one gateway order covering the unpaid records among
    /// `record_ids` and stamp its id on them.
    pub async fn create_order(
        &self,
        actor: &Actor,
        record_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<OrderSummary, LedgerError> {
        if !actor.is_tenant() {
            return Err(LedgerError::authorization("only tenants can pay rent online"));
        }

        let ids: BTreeSet<&str> = record_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(LedgerError::validation("at least one payment id is required"));
        }
        let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();

        let records = self.store.find_by_ids(&ids).await?;
        if records.len() != ids.len() {
            let unknown: Vec<&str> = ids
                .iter()
                .filter(|id| !records.iter().any(|r| &r.id == *id))
                .map(String::as_str)
                .collect();
            return Err(LedgerError::validation(format!(
                "unknown payment ids: {}",
                unknown.join(", ")
            )));
        }
        if records.iter().any(|r| r.tenant_id != actor.id) {
            return Err(LedgerError::authorization(
                "payments belong to a different tenant",
            ));
        }

        let mut eligible: Vec<PaymentRecord> =
            records.into_iter().filter(|r| !r.is_paid()).collect();
        if eligible.is_empty() {
            return Err(LedgerError::NoEligibleRecords);
        }
        eligible.sort_by_key(|r| r.lease_month);

        if let Some(held) = eligible.iter().find(|r| self.is_order_held(r, now)) {
            let order_id = held.external_order_id.clone().unwrap_or_default();
            tracing::warn!(
                record_id = %held.id,
                order_id = %order_id,
                "Rejected new order while a previous order is in progress"
            );
            return Err(LedgerError::OrderInProgress(order_id));
        }

        if !self.gateway.is_available() {
            metrics::record_gateway_failure(GatewayError::NotConfigured.reason());
            return Err(LedgerError::GatewayUnavailable(
                GatewayError::NotConfigured.to_string(),
            ));
        }

        let today = now.date_naive();
        let lines: Vec<OrderLine> = eligible
            .iter()
            .map(|record| {
                let view = ledger::view(record, &self.policy, today);
                OrderLine {
                    record_id: view.id,
                    month_label: view.month_label,
                    base_amount: view.base_amount,
                    late_fee: view.late_fee,
                    total_amount: view.total_amount,
                }
            })
            .collect();
        let amount: Decimal = lines.iter().map(|l| l.total_amount).sum();
        let amount_minor = ledger::to_minor_units(amount)?;

        let receipt = format!("rent_{}", now.timestamp_millis());
        let properties: BTreeSet<&str> = eligible.iter().map(|r| r.property_id.as_str()).collect();
        let notes = json!({
            "tenant_id": actor.id,
            "property_id": properties.into_iter().collect::<Vec<_>>().join(","),
            "payment_count": eligible.len(),
        });

        let order = self
            .call_gateway(
                self.gateway
                    .create_order(amount_minor, &self.currency, &receipt, notes),
            )
            .await?;

        let claims: Vec<OrderClaim> = eligible.iter().map(OrderClaim::from).collect();
        self.store.stamp_order(&claims, &order.id, now).await?;

        for record in eligible.iter().filter(|r| r.external_order_id.is_some()) {
            tracing::info!(
                record_id = %record.id,
                superseded_order_id = ?record.external_order_id,
                order_id = %order.id,
                "Superseded expired order"
            );
        }
        tracing::info!(
            order_id = %order.id,
            tenant_id = %actor.id,
            records = eligible.len(),
            amount_minor,
            "Rent order created"
        );

        Ok(OrderSummary {
            order_id: order.id,
            amount,
            amount_minor,
            currency: order.currency,
            receipt,
            key_id: self.gateway.key_id(),
            records: lines,
        })
    }

    /// Check the gateway's signed confirmation and settle every record of
    /// the order. Verifying an already settled order returns the same records
    /// without writing anything.
    pub async fn verify_and_settle(
        &self,
        order_id: &str,
        transaction_id: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentRecord>, LedgerError> {
        // Signatures are checked against the exact bytes supplied.
        if [order_id, transaction_id, signature]
            .iter()
            .any(|value| value.trim().is_empty())
        {
            return Err(LedgerError::validation(
                "order_id, payment_id and signature are required",
            ));
        }

        if !self.gateway.is_available() {
            metrics::record_gateway_failure(GatewayError::NotConfigured.reason());
            return Err(LedgerError::GatewayUnavailable(
                GatewayError::NotConfigured.to_string(),
            ));
        }

        let is_valid = self
            .gateway
            .verify_payment_signature(order_id, transaction_id, signature)
            .map_err(|e| self.gateway_failure(e))?;
        if !is_valid {
            tracing::warn!(
                order_id = %order_id,
                payment_id = %transaction_id,
                "Rejected payment confirmation with invalid signature"
            );
            return Err(LedgerError::InvalidSignature);
        }

        let before = self.store.find_by_order(order_id).await?;
        if before.is_empty() {
            return Err(LedgerError::OrderNotFound(order_id.to_string()));
        }

        let settlement = Settlement::gateway(transaction_id, signature, now);
        let records = self.store.settle_order(order_id, &settlement).await?;

        let newly_settled: Vec<&PaymentRecord> = before.iter().filter(|r| !r.is_paid()).collect();
        if newly_settled.is_empty() {
            tracing::info!(order_id = %order_id, "Order already settled");
        } else {
            let amount: Decimal = newly_settled.iter().map(|r| r.base_amount).sum();
            metrics::record_settlement(
                PaymentMethod::Gateway.as_str(),
                newly_settled.len() as u64,
                ledger::to_minor_units(amount).unwrap_or_default(),
            );
            tracing::info!(
                order_id = %order_id,
                payment_id = %transaction_id,
                records = newly_settled.len(),
                "Rent payment settled"
            );
        }

        Ok(records)
    }

    /// Owner-recorded cash or bank transfer payment.
    pub async fn mark_manually_paid(
        &self,
        actor: &Actor,
        record_id: &str,
        method: PaymentMethod,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, LedgerError> {
        if !actor.is_owner() {
            return Err(LedgerError::authorization(
                "only the owner can record manual payments",
            ));
        }
        if !method.is_manual() {
            return Err(LedgerError::validation(
                "payment method must be cash or bank_transfer",
            ));
        }

        let record = self
            .store
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| LedgerError::validation(format!("unknown payment id: {}", record_id)))?;
        if record.owner_id != actor.id {
            return Err(LedgerError::authorization("payment belongs to a different owner"));
        }
        if record.is_paid() {
            return Err(LedgerError::AlreadySettled(record.id));
        }
        if self.is_order_held(&record, now) {
            let order_id = record.external_order_id.clone().unwrap_or_default();
            tracing::warn!(
                record_id = %record.id,
                order_id = %order_id,
                "Rejected manual payment while a gateway order is in progress"
            );
            return Err(LedgerError::OrderInProgress(order_id));
        }
        if let Some(order_id) = &record.external_order_id {
            tracing::warn!(
                record_id = %record.id,
                order_id = %order_id,
                "Superseding expired gateway order with a manual payment"
            );
        }

        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let settled = self
            .store
            .settle_record(
                &OrderClaim::from(&record),
                &Settlement::manual(method, note, now),
            )
            .await?;

        metrics::record_settlement(
            method.as_str(),
            1,
            ledger::to_minor_units(settled.base_amount).unwrap_or_default(),
        );
        tracing::info!(
            record_id = %settled.id,
            owner_id = %actor.id,
            method = %method,
            "Payment marked as paid manually"
        );

        Ok(settled)
    }

    /// A tenant's ledger. Owners only see the records they own.
    pub async fn list_for_tenant(
        &self,
        actor: &Actor,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TenantLedger, LedgerError> {
        if actor.is_tenant() && actor.id != tenant_id {
            return Err(LedgerError::authorization(
                "tenants can only view their own payments",
            ));
        }

        let today = now.date_naive();
        let payments: Vec<PaymentView> = self
            .store
            .list_for_tenant(tenant_id)
            .await?
            .iter()
            .filter(|r| actor.is_tenant() || r.owner_id == actor.id)
            .map(|r| ledger::view(r, &self.policy, today))
            .collect();

        Ok(summary::tenant_ledger(
            tenant_id,
            payments,
            self.policy.severe_overdue_days,
        ))
    }

    pub async fn list_for_owner(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<OwnerLedger, LedgerError> {
        if !actor.is_owner() {
            return Err(LedgerError::authorization("only owners can view the owner ledger"));
        }

        let today = now.date_naive();
        let payments = self
            .store
            .list_for_owner(&actor.id)
            .await?
            .iter()
            .map(|r| ledger::view(r, &self.policy, today))
            .collect();

        Ok(summary::owner_ledger(&actor.id, payments))
    }

    /// A single record, visible to its owner and its tenant.
    pub async fn get_record(
        &self,
        actor: &Actor,
        record_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentView, LedgerError> {
        let record = self
            .store
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| LedgerError::RecordNotFound(record_id.to_string()))?;

        let allowed = if actor.is_owner() {
            record.owner_id == actor.id
        } else {
            record.tenant_id == actor.id
        };
        if !allowed {
            return Err(LedgerError::authorization("access denied to this payment"));
        }

        Ok(ledger::view(&record, &self.policy, now.date_naive()))
    }

    fn is_order_held(&self, record: &PaymentRecord, now: DateTime<Utc>) -> bool {
        match (&record.external_order_id, record.order_stamped_at) {
            (Some(_), Some(stamped_at)) => now - stamped_at < self.order_hold,
            _ => false,
        }
    }

    async fn call_gateway<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, LedgerError> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result.map_err(|e| self.gateway_failure(e)),
            Err(_) => {
                metrics::record_gateway_failure("timeout");
                tracing::error!(
                    timeout_secs = self.gateway_timeout.as_secs(),
                    "Payment gateway call timed out"
                );
                Err(LedgerError::GatewayUnavailable(
                    "payment gateway timed out".to_string(),
                ))
            }
        }
    }

    fn gateway_failure(&self, err: GatewayError) -> LedgerError {
        metrics::record_gateway_failure(err.reason());
        tracing::error!(error = %err, "Payment gateway call failed");
        LedgerError::GatewayUnavailable(err.to_string())
    }
}
