//! Buyer and seller notification hooks.
//!
//! Notification dispatch is deliberately decoupled from the financial transactions: the engine publishes events
//! only after a transaction commits, and whatever goes wrong here is logged and swallowed. A failed email must
//! never roll back a ledger entry.
use std::{future::Future, pin::Pin};

use log::*;
use shutter_payment_engine::events::{
    EventHooks,
    OrderAnnulledEvent,
    OrderPaidEvent,
    SaleReversedEvent,
    WithdrawalSettledEvent,
};

/// Builds the hook set the server registers with the engine. The actual delivery channels (email, in-app) live
/// with the storefront; this service emits structured log lines that the notification workers consume.
pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|event| Box::pin(notify_order_paid(event)) as Pin<Box<dyn Future<Output = ()> + Send>>);
    hooks.on_order_annulled(
        |event| Box::pin(notify_order_annulled(event)) as Pin<Box<dyn Future<Output = ()> + Send>>,
    );
    hooks.on_sale_reversed(|event| Box::pin(notify_sale_reversed(event)) as Pin<Box<dyn Future<Output = ()> + Send>>);
    hooks.on_withdrawal_settled(
        |event| Box::pin(notify_withdrawal_settled(event)) as Pin<Box<dyn Future<Output = ()> + Send>>,
    );
    hooks
}

async fn notify_order_paid(event: OrderPaidEvent) {
    let order = &event.order;
    info!("📧️ Notifying buyer {} that order [{}] is paid ({}).", order.buyer_id, order.order_id, order.total_price);
    for credit in &event.credits {
        info!(
            "📧️ Notifying seller {} of a {} sale (asset {}, order [{}]).",
            credit.seller_id, credit.credited, credit.asset_id, order.order_id
        );
    }
}

async fn notify_order_annulled(event: OrderAnnulledEvent) {
    let order = &event.order;
    info!("📧️ Notifying buyer {} that order [{}] was cancelled.", order.buyer_id, order.order_id);
}

async fn notify_sale_reversed(event: SaleReversedEvent) {
    let order = &event.order;
    for reversal in &event.reversals {
        info!(
            "📧️ Notifying seller {} that order [{}] was refunded; {} reversed.",
            reversal.seller_id, order.order_id, reversal.reversed
        );
    }
}

async fn notify_withdrawal_settled(event: WithdrawalSettledEvent) {
    let request = &event.request;
    if event.success {
        info!(
            "📧️ Notifying seller {} that withdrawal #{} of {} was paid out.",
            request.seller_id, request.id, request.amount
        );
    } else {
        info!(
            "📧️ Notifying seller {} that withdrawal #{} failed: {}. Funds returned to their balance.",
            request.seller_id,
            request.id,
            event.reason.as_deref().unwrap_or("no reason given")
        );
    }
}
