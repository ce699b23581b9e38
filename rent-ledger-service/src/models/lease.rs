use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lease parameters supplied by the lease source when a tenant is assigned
/// to a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub tenant_id: String,
    pub property_id: String,
    pub owner_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_rent: Decimal,
}
