//! service-core: HTTP, error and observability plumbing shared by the
//! rent ledger service.
pub mod error;
pub mod middleware;
pub mod observability;
pub mod utils;
