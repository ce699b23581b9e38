//! Persistence seam for payment records.
//!
//! Every mutating method is atomic: it either applies to all the records it
//! names or leaves the store unchanged.

use crate::error::LedgerError;
use crate::models::{PaymentRecord, Settlement};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A record to stamp with a new order, and the order id the caller saw on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClaim {
    pub record_id: String,
    pub expected_order_id: Option<String>,
}

impl From<&PaymentRecord> for OrderClaim {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            record_id: record.id.clone(),
            expected_order_id: record.external_order_id.clone(),
        }
    }
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a whole schedule. Fails with `DuplicateSchedule` if any record
    /// already exists for one of the (tenant, property) pairs.
    async fn insert_schedule(&self, records: &[PaymentRecord]) -> Result<(), LedgerError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<PaymentRecord>, LedgerError>;

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<PaymentRecord>, LedgerError>;

    async fn find_by_order(&self, order_id: &str) -> Result<Vec<PaymentRecord>, LedgerError>;

    /// Records of a tenant, oldest lease month first.
    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentRecord>, LedgerError>;

    /// Records of an owner, newest lease month first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<PaymentRecord>, LedgerError>;

    /// Stamp `order_id` on every claimed record, provided each is still
    /// unpaid and still carries the order id the caller observed. Otherwise
    /// nothing is written and `OrderInProgress` is returned.
    async fn stamp_order(
        &self,
        claims: &[OrderClaim],
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// Mark every unpaid record of the order as paid and return all of the
    /// order's records. Already-paid records are left untouched.
    async fn settle_order(
        &self,
        order_id: &str,
        settlement: &Settlement,
    ) -> Result<Vec<PaymentRecord>, LedgerError>;

    /// Mark a single unpaid record as paid outside any gateway order,
    /// provided it still carries the order id the caller observed. That
    /// order id, if any, is moved to `superseded_order_ids`. A record whose
    /// order changed meanwhile fails with `OrderInProgress`.
    async fn settle_record(
        &self,
        claim: &OrderClaim,
        settlement: &Settlement,
    ) -> Result<PaymentRecord, LedgerError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), LedgerError>;
}

/// In-memory store used by tests and database-less local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<HashMap<String, PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_schedule(&self, records: &[PaymentRecord]) -> Result<(), LedgerError> {
        let mut stored = self.records.write().await;

        for record in records {
            if stored.values().any(|existing| {
                existing.tenant_id == record.tenant_id && existing.property_id == record.property_id
            }) {
                return Err(LedgerError::DuplicateSchedule {
                    tenant_id: record.tenant_id.clone(),
                    property_id: record.property_id.clone(),
                });
            }
        }

        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PaymentRecord>, LedgerError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<PaymentRecord>, LedgerError> {
        let stored = self.records.read().await;
        Ok(ids.iter().filter_map(|id| stored.get(id).cloned()).collect())
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        let stored = self.records.read().await;
        let mut records: Vec<_> = stored
            .values()
            .filter(|r| r.external_order_id.as_deref() == Some(order_id))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.lease_month);
        Ok(records)
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        let stored = self.records.read().await;
        let mut records: Vec<_> = stored
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.lease_month);
        Ok(records)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        let stored = self.records.read().await;
        let mut records: Vec<_> = stored
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.lease_month.cmp(&a.lease_month));
        Ok(records)
    }

    async fn stamp_order(
        &self,
        claims: &[OrderClaim],
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut stored = self.records.write().await;

        for claim in claims {
            let current = stored
                .get(&claim.record_id)
                .ok_or_else(|| LedgerError::RecordNotFound(claim.record_id.clone()))?;
            if current.is_paid() || current.external_order_id != claim.expected_order_id {
                return Err(LedgerError::OrderInProgress(
                    current.external_order_id.clone().unwrap_or_default(),
                ));
            }
        }

        for claim in claims {
            if let Some(record) = stored.get_mut(&claim.record_id) {
                record.stamp_order(order_id, now);
            }
        }
        Ok(())
    }

    async fn settle_order(
        &self,
        order_id: &str,
        settlement: &Settlement,
    ) -> Result<Vec<PaymentRecord>, LedgerError> {
        let mut stored = self.records.write().await;

        let mut settled = Vec::new();
        for record in stored
            .values_mut()
            .filter(|r| r.external_order_id.as_deref() == Some(order_id))
        {
            if !record.is_paid() {
                record.apply_settlement(settlement);
            }
            settled.push(record.clone());
        }

        if settled.is_empty() {
            return Err(LedgerError::OrderNotFound(order_id.to_string()));
        }
        settled.sort_by_key(|r| r.lease_month);
        Ok(settled)
    }

    async fn settle_record(
        &self,
        claim: &OrderClaim,
        settlement: &Settlement,
    ) -> Result<PaymentRecord, LedgerError> {
        let mut stored = self.records.write().await;
        let record = stored
            .get_mut(&claim.record_id)
            .ok_or_else(|| LedgerError::RecordNotFound(claim.record_id.clone()))?;

        if record.is_paid() {
            return Err(LedgerError::AlreadySettled(claim.record_id.clone()));
        }
        if record.external_order_id != claim.expected_order_id {
            return Err(LedgerError::OrderInProgress(
                record.external_order_id.clone().unwrap_or_default(),
            ));
        }
        record.release_order();
        record.apply_settlement(settlement);
        Ok(record.clone())
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lease, PaymentMethod};
    use crate::services::ledger::{build_schedule, LedgerPolicy};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn schedule(tenant: &str, property: &str, months: u32) -> Vec<PaymentRecord> {
        let lease = Lease {
            tenant_id: tenant.to_string(),
            property_id: property.to_string(),
            owner_id: "owner-1".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, months, 1).unwrap(),
            monthly_rent: Decimal::from(10_000),
        };
        build_schedule(&lease, &LedgerPolicy::default(), now()).unwrap()
    }

    #[tokio::test]
    async fn rejects_second_schedule_for_same_pair() {
        let store = InMemoryPaymentStore::new();
        store.insert_schedule(&schedule("t1", "p1", 3)).await.unwrap();

        let err = store.insert_schedule(&schedule("t1", "p1", 2)).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateSchedule { .. }));
        assert_eq!(store.len().await, 3);

        store.insert_schedule(&schedule("t1", "p2", 2)).await.unwrap();
        assert_eq!(store.len().await, 5);
    }

    #[tokio::test]
    async fn stale_claim_writes_nothing() {
        let store = InMemoryPaymentStore::new();
        let records = schedule("t1", "p1", 2);
        store.insert_schedule(&records).await.unwrap();

        let claims: Vec<OrderClaim> = records.iter().map(OrderClaim::from).collect();
        store.stamp_order(&claims, "order_a", now()).await.unwrap();

        // Same observation again: the records now carry order_a.
        let err = store.stamp_order(&claims, "order_b", now()).await.unwrap_err();
        assert!(matches!(err, LedgerError::OrderInProgress(_)));

        let orders = store.find_by_order("order_a").await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(store.find_by_order("order_b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settling_twice_is_idempotent() {
        let store = InMemoryPaymentStore::new();
        let records = schedule("t1", "p1", 2);
        store.insert_schedule(&records).await.unwrap();
        let claims: Vec<OrderClaim> = records.iter().map(OrderClaim::from).collect();
        store.stamp_order(&claims, "order_a", now()).await.unwrap();

        let settlement = Settlement::gateway("pay_1", "sig", now());
        let first = store.settle_order("order_a", &settlement).await.unwrap();
        let second = store.settle_order("order_a", &settlement).await.unwrap();

        assert_eq!(first, second);
        assert!(first.iter().all(PaymentRecord::is_paid));
    }

    #[tokio::test]
    async fn manual_settlement_rejects_paid_records() {
        let store = InMemoryPaymentStore::new();
        let records = schedule("t1", "p1", 1);
        store.insert_schedule(&records).await.unwrap();

        let settlement = Settlement::manual(PaymentMethod::Cash, None, now());
        let claim = OrderClaim::from(&records[0]);
        store.settle_record(&claim, &settlement).await.unwrap();
        let err = store.settle_record(&claim, &settlement).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadySettled(_)));
    }

    #[tokio::test]
    async fn manual_settlement_requires_the_observed_order() {
        let store = InMemoryPaymentStore::new();
        let records = schedule("t1", "p1", 1);
        store.insert_schedule(&records).await.unwrap();

        let stale = OrderClaim::from(&records[0]);
        store
            .stamp_order(&[stale.clone()], "order_a", now())
            .await
            .unwrap();

        let settlement = Settlement::manual(PaymentMethod::Cash, None, now());
        let err = store.settle_record(&stale, &settlement).await.unwrap_err();
        assert!(matches!(err, LedgerError::OrderInProgress(ref id) if id == "order_a"));

        let current = store.find_by_id(&records[0].id).await.unwrap().unwrap();
        let settled = store
            .settle_record(&OrderClaim::from(&current), &settlement)
            .await
            .unwrap();
        assert!(settled.is_paid());
        assert!(settled.external_order_id.is_none());
        assert_eq!(settled.superseded_order_ids, vec!["order_a".to_string()]);
        assert!(store.find_by_order("order_a").await.unwrap().is_empty());
    }
}
