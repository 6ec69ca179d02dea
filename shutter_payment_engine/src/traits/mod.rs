//! Behaviour contracts for payment engine backends and external collaborators.
//!
//! Storage backends implement [`PaymentGatewayDatabase`] (financial state transitions) and [`LedgerManagement`]
//! (read-side queries). The payout processor talks to the outside world exclusively through [`TransferInitiator`],
//! so the transfer provider can be swapped or mocked without touching the state machine.

mod ledger_management;
mod payment_gateway_database;
mod transfer_initiator;

pub use ledger_management::LedgerManagement;
pub use payment_gateway_database::{PaidOrderOutcome, PaymentGatewayDatabase, PaymentGatewayError, RefundOutcome};
pub use transfer_initiator::{TransferInitiator, TransferInitiatorError};

/// Shorthand for backends that implement the full engine surface. HTTP handlers are generic over this so a single
/// type parameter can serve both the write and read APIs.
pub trait EngineBackend: PaymentGatewayDatabase + LedgerManagement {}

impl<T> EngineBackend for T where T: PaymentGatewayDatabase + LedgerManagement {}
