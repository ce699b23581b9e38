pub mod engine;
pub mod gateway;
pub mod ledger;
pub mod metrics;
pub mod razorpay;
pub mod repository;
pub mod store;
pub mod summary;

pub use engine::{LedgerEngine, OrderLine, OrderSummary};
pub use gateway::{GatewayError, GatewayOrder, PaymentGateway, UnavailableGateway};
pub use ledger::LedgerPolicy;
pub use metrics::{get_metrics, init_metrics};
pub use razorpay::RazorpayClient;
pub use repository::MongoPaymentStore;
pub use store::{InMemoryPaymentStore, OrderClaim, PaymentStore};
pub use summary::{LedgerSummary, OwnerLedger, SevereOverdue, TenantBreakdown, TenantLedger};
