use crate::db_types::{Order, SaleCredit, SaleReversal, WithdrawalRequest};

/// Published after an order has been marked paid and its sellers credited. Carries the per-seller credits so
/// subscribers can notify each seller without re-reading the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub credits: Vec<SaleCredit>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, credits: Vec<SaleCredit>) -> Self {
        Self { order, credits }
    }
}

/// Published when a pending order is cancelled after a rejected or cancelled payment.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAnnulledEvent {
    pub order: Order,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published after a refund or chargeback reversed the seller credits of a paid order.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleReversedEvent {
    pub order: Order,
    pub reversals: Vec<SaleReversal>,
}

impl SaleReversedEvent {
    pub fn new(order: Order, reversals: Vec<SaleReversal>) -> Self {
        Self { order, reversals }
    }
}

/// Published when a withdrawal reaches a terminal state: either the transfer settled, or it failed and the funds
/// were returned.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalSettledEvent {
    pub request: WithdrawalRequest,
    pub success: bool,
    pub reason: Option<String>,
}

impl WithdrawalSettledEvent {
    pub fn settled(request: WithdrawalRequest) -> Self {
        Self { request, success: true, reason: None }
    }

    pub fn failed(request: WithdrawalRequest, reason: impl Into<String>) -> Self {
        Self { request, success: false, reason: Some(reason.into()) }
    }
}
