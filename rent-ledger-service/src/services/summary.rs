//! Read-side roll-ups for the tenant and owner dashboards.

use crate::models::{PaymentStatus, PaymentView};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total_payments: usize,
    pub paid_payments: usize,
    pub pending_payments: usize,
    pub overdue_payments: usize,
    /// Sum of base amounts across all records.
    pub total_amount: Decimal,
    pub total_paid: Decimal,
    /// Base amount of pending and overdue records.
    pub total_pending: Decimal,
    pub total_late_fees: Decimal,
    /// `total_pending` plus late fees.
    pub total_outstanding: Decimal,
}

/// Unpaid records past the severe threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SevereOverdue {
    pub months: usize,
    /// Base amount plus late fees.
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantLedger {
    pub tenant_id: String,
    pub summary: LedgerSummary,
    pub severely_overdue: SevereOverdue,
    pub payments: Vec<PaymentView>,
}

/// Running totals for one (tenant, property) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantBreakdown {
    pub tenant_id: String,
    pub property_id: String,
    pub total_rent: Decimal,
    pub total_paid: Decimal,
    pub total_pending: Decimal,
    pub total_overdue: Decimal,
    pub late_fees: Decimal,
    pub payments: Vec<PaymentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerLedger {
    pub owner_id: String,
    pub summary: LedgerSummary,
    pub tenants: Vec<TenantBreakdown>,
    pub payments: Vec<PaymentView>,
}

pub fn summarize(payments: &[PaymentView]) -> LedgerSummary {
    let mut summary = LedgerSummary {
        total_payments: payments.len(),
        ..LedgerSummary::default()
    };

    for payment in payments {
        summary.total_amount += payment.base_amount;
        summary.total_late_fees += payment.late_fee;
        match payment.status {
            PaymentStatus::Paid => {
                summary.paid_payments += 1;
                summary.total_paid += payment.base_amount;
            }
            PaymentStatus::Pending => {
                summary.pending_payments += 1;
                summary.total_pending += payment.base_amount;
            }
            PaymentStatus::Overdue => {
                summary.overdue_payments += 1;
                summary.total_pending += payment.base_amount;
            }
        }
    }

    summary.total_outstanding = summary.total_pending + summary.total_late_fees;
    summary
}

pub fn severely_overdue(payments: &[PaymentView], threshold_days: i64) -> SevereOverdue {
    payments
        .iter()
        .filter(|p| p.status != PaymentStatus::Paid && p.days_overdue > threshold_days)
        .fold(SevereOverdue::default(), |mut acc, p| {
            acc.months += 1;
            acc.amount += p.total_amount;
            acc
        })
}

pub fn tenant_ledger(
    tenant_id: &str,
    payments: Vec<PaymentView>,
    severe_threshold_days: i64,
) -> TenantLedger {
    TenantLedger {
        tenant_id: tenant_id.to_string(),
        summary: summarize(&payments),
        severely_overdue: severely_overdue(&payments, severe_threshold_days),
        payments,
    }
}

pub fn owner_ledger(owner_id: &str, payments: Vec<PaymentView>) -> OwnerLedger {
    let mut groups: BTreeMap<(String, String), TenantBreakdown> = BTreeMap::new();

    for payment in &payments {
        let entry = groups
            .entry((payment.tenant_id.clone(), payment.property_id.clone()))
            .or_insert_with(|| TenantBreakdown {
                tenant_id: payment.tenant_id.clone(),
                property_id: payment.property_id.clone(),
                ..TenantBreakdown::default()
            });

        entry.total_rent += payment.base_amount;
        entry.late_fees += payment.late_fee;
        match payment.status {
            PaymentStatus::Paid => entry.total_paid += payment.base_amount,
            PaymentStatus::Overdue => {
                entry.total_pending += payment.base_amount;
                entry.total_overdue += payment.base_amount;
            }
            PaymentStatus::Pending => entry.total_pending += payment.base_amount,
        }
        entry.payments.push(payment.clone());
    }

    OwnerLedger {
        owner_id: owner_id.to_string(),
        summary: summarize(&payments),
        tenants: groups.into_values().collect(),
        payments,
    }
}
