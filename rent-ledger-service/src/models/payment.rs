use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of a ledger record.
///
/// Only `Pending` and `Paid` are ever persisted. `Overdue` is the derived
/// name for a pending record whose due date has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Overdue,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Overdue => "overdue",
            Self::Paid => "paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Gateway,
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
        }
    }

    /// Methods an owner may record by hand.
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Cash | Self::BankTransfer)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scheduled monthly rent obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub property_id: String,
    pub owner_id: String,
    /// First day of the month this record covers (UTC calendar date).
    pub lease_month: NaiveDate,
    pub due_date: NaiveDate,
    pub base_amount: Decimal,
    pub status: PaymentStatus,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub external_order_id: Option<String>,
    #[serde(default)]
    pub order_stamped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub superseded_order_ids: Vec<String>,
    #[serde(default)]
    pub external_transaction_id: Option<String>,
    #[serde(default)]
    pub external_signature: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    /// "January 2024" style label for dashboards and order breakdowns.
    pub fn month_label(&self) -> String {
        self.lease_month.format("%B %Y").to_string()
    }

    /// Replace the stamped gateway order, keeping the previous id for
    /// reconciliation.
    pub fn stamp_order(&mut self, order_id: &str, now: DateTime<Utc>) {
        if let Some(previous) = self.external_order_id.take() {
            if previous != order_id {
                self.superseded_order_ids.push(previous);
            }
        }
        self.external_order_id = Some(order_id.to_string());
        self.order_stamped_at = Some(now);
        self.updated_at = now;
    }

    /// Detach the stamped gateway order, keeping its id for reconciliation.
    pub fn release_order(&mut self) {
        if let Some(previous) = self.external_order_id.take() {
            self.superseded_order_ids.push(previous);
        }
        self.order_stamped_at = None;
    }

    /// Apply the paid transition. Proof fields already present are kept.
    pub fn apply_settlement(&mut self, settlement: &Settlement) {
        self.status = PaymentStatus::Paid;
        self.payment_date = Some(settlement.paid_at);
        self.payment_method = Some(settlement.method);
        if self.external_transaction_id.is_none() {
            self.external_transaction_id = settlement.transaction_id.clone();
        }
        if self.external_signature.is_none() {
            self.external_signature = settlement.signature.clone();
        }
        if let Some(note) = &settlement.note {
            self.notes = note.clone();
        }
        self.updated_at = settlement.paid_at;
    }
}

/// Everything written by the paid transition.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub paid_at: DateTime<Utc>,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub signature: Option<String>,
    pub note: Option<String>,
}

impl Settlement {
    pub fn gateway(
        transaction_id: impl Into<String>,
        signature: impl Into<String>,
        paid_at: DateTime<Utc>,
    ) -> Self {
        Self {
            paid_at,
            method: PaymentMethod::Gateway,
            transaction_id: Some(transaction_id.into()),
            signature: Some(signature.into()),
            note: None,
        }
    }

    pub fn manual(method: PaymentMethod, note: Option<String>, paid_at: DateTime<Utc>) -> Self {
        Self {
            paid_at,
            method,
            transaction_id: None,
            signature: None,
            note,
        }
    }
}

/// A record as shown to dashboards: persisted fields plus the amounts and
/// status derived as of the read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: String,
    pub tenant_id: String,
    pub property_id: String,
    pub owner_id: String,
    pub lease_month: NaiveDate,
    pub month_label: String,
    pub due_date: NaiveDate,
    pub base_amount: Decimal,
    pub late_fee: Decimal,
    pub total_amount: Decimal,
    pub days_overdue: i64,
    pub status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub external_order_id: Option<String>,
    pub external_transaction_id: Option<String>,
    pub notes: String,
}
