pub mod actor;
pub mod lease;
pub mod payment;

pub use actor::{Actor, Role};
pub use lease::Lease;
pub use payment::{PaymentMethod, PaymentRecord, PaymentStatus, PaymentView, Settlement};
