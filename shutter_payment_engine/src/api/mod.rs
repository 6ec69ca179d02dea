//! The payment engine public API.
//!
//! Backends implement the traits in [`crate::traits`]; these API structs wrap a backend with the business rules
//! and publish events after the underlying transactions commit.
pub mod ledger_api;
pub mod order_flow_api;
pub mod payout_api;
