//! ShutterPay Payment Engine
//!
//! The payment engine turns external payment-provider events into durable, consistent financial state for a
//! digital-photo marketplace: orders, per-seller balances, an append-only transaction ledger and a withdrawal
//! pipeline. This library contains the core logic and is provider-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the database directly;
//!    use the public API instead. The exception is the data types, which are defined in the `db_types` module and
//!    are public.
//! 2. The engine public API ([`mod@api`]): order flow (creation, payment approval/rejection/refund), payouts
//!    (the withdrawal state machine) and ledger queries. Backends implement the traits in [`mod@traits`] to serve
//!    these APIs.
//! 3. Pure cart pricing ([`mod@pricing`]), shared by cart previews and order creation so the buyer-visible total
//!    always matches the charged total.
//!
//! The engine also provides a set of events that can be subscribed to ([`mod@events`]). Events are published
//! strictly after the transaction that caused them commits; subscribers typically dispatch buyer and seller
//! notifications, and their failures never affect financial state.
pub mod api;
pub mod db_types;
pub mod events;
pub mod pricing;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{db, SqliteDatabase};

pub use api::{
    ledger_api::{LedgerApi, LedgerAudit},
    order_flow_api::OrderFlowApi,
    payout_api::{withdrawal_id_from_description, PayoutApi, TRANSFER_DESCRIPTION_PREFIX},
};
pub use traits::{
    EngineBackend,
    LedgerManagement,
    PaidOrderOutcome,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    RefundOutcome,
    TransferInitiator,
    TransferInitiatorError,
};
