use crate::models::{Lease, PaymentMethod, PaymentView};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateScheduleRequest {
    #[validate(length(min = 1, max = 128))]
    pub tenant_id: String,
    #[validate(length(min = 1, max = 128))]
    pub property_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_rent: Decimal,
}

impl GenerateScheduleRequest {
    /// The lease as issued by `owner_id`.
    pub fn into_lease(self, owner_id: &str) -> Lease {
        Lease {
            tenant_id: self.tenant_id,
            property_id: self.property_id,
            owner_id: owner_id.to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            monthly_rent: self.monthly_rent,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateScheduleResponse {
    pub count: usize,
    pub payments: Vec<PaymentView>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 36))]
    pub payment_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1))]
    pub razorpay_signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub message: String,
    pub payments: Vec<PaymentView>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MarkPaidRequest {
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkPaidResponse {
    pub message: String,
    pub payment: PaymentView,
}
