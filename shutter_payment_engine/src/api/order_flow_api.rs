use std::fmt::Debug;

use log::*;
use spg_common::Cents;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, SaleCredit},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent, SaleReversedEvent},
    pricing::{price_cart, CartItem},
    traits::{PaidOrderOutcome, PaymentGatewayDatabase, PaymentGatewayError, RefundOutcome},
};

/// `OrderFlowApi` is the primary API for order creation and for the financial state transitions driven by payment
/// provider notifications.
pub struct OrderFlowApi<B> {
    db: B,
    fee_percent: i64,
    default_price: Cents,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, fee_percent: i64, default_price: Cents, producers: EventProducers) -> Self {
        Self { db, fee_percent, default_price, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Creates a new `Pending` order from a cart. Every item is priced by the pricing engine against the whole
    /// cart; the prices are frozen on the order items and the order total is their sum. The same pricing call
    /// backs cart previews, so the total a buyer saw is the total that gets charged.
    pub async fn create_order(&self, buyer_id: &str, cart: Vec<CartItem>) -> Result<Order, PaymentGatewayError> {
        let prices = price_cart(&cart, self.default_price);
        let items = cart
            .into_iter()
            .zip(prices)
            .map(|(item, paid_price)| NewOrderItem {
                asset_id: item.asset_id,
                seller_id: item.seller_id,
                collection_id: item.collection.map(|c| c.collection_id),
                paid_price,
            })
            .collect();
        let order = NewOrder::new(buyer_id.to_string(), items);
        let (order, inserted) = self.db.insert_order(order).await?;
        if inserted {
            info!("🔄️📦️ Order [{}] created for buyer {buyer_id}. Total: {}", order.order_id, order.total_price);
        }
        Ok(order)
    }

    /// Handles an `approved` payment notification: marks the order paid and credits every seller, exactly once.
    /// Duplicate deliveries return [`PaidOrderOutcome::AlreadyProcessed`] and have no financial effect.
    pub async fn payment_approved(
        &self,
        order_id: &OrderId,
        external_payment_id: &str,
    ) -> Result<PaidOrderOutcome, PaymentGatewayError> {
        let outcome = self.db.confirm_order_paid(order_id, external_payment_id, self.fee_percent).await?;
        match &outcome {
            PaidOrderOutcome::Credited { order, credits } => {
                info!(
                    "🔄️💰️ Order [{order_id}] paid (payment {external_payment_id}). {} seller(s) credited.",
                    credits.len()
                );
                self.call_order_paid_hook(order, credits).await;
            },
            PaidOrderOutcome::AlreadyProcessed { .. } => {
                info!("🔄️💰️ Order [{order_id}] was already processed. Duplicate notification ignored.");
            },
        }
        Ok(outcome)
    }

    /// Handles a `rejected` or `cancelled` payment notification. Cancelling an order that is no longer pending is
    /// a no-op.
    pub async fn payment_rejected(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let cancelled = self.db.cancel_order(order_id).await?;
        if let Some(order) = &cancelled {
            info!("🔄️❌️ Order [{order_id}] cancelled after rejected payment.");
            for emitter in &self.producers.order_annulled_producer {
                emitter.publish_event(OrderAnnulledEvent::new(order.clone())).await;
            }
        }
        Ok(cancelled)
    }

    /// Handles a `refunded` / `charged_back` payment notification: reverses every seller's credit for the order,
    /// exactly once. Replays return [`RefundOutcome::NotReversible`] and have no financial effect.
    pub async fn payment_reversed(&self, order_id: &OrderId) -> Result<RefundOutcome, PaymentGatewayError> {
        let outcome = self.db.reverse_order_sales(order_id, self.fee_percent).await?;
        match &outcome {
            RefundOutcome::Reversed { order, reversals } => {
                warn!("🔄️↩️ Order [{order_id}] refunded. {} seller reversal(s) applied.", reversals.len());
                for emitter in &self.producers.sale_reversed_producer {
                    emitter.publish_event(SaleReversedEvent::new(order.clone(), reversals.clone())).await;
                }
            },
            RefundOutcome::NotReversible { order } => {
                info!("🔄️↩️ Refund for order [{order_id}] ignored; order status is {}.", order.status);
            },
        }
        Ok(outcome)
    }

    async fn call_order_paid_hook(&self, order: &Order, credits: &[SaleCredit]) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️📦️ Notifying order paid hook subscribers");
            emitter.publish_event(OrderPaidEvent::new(order.clone(), credits.to_vec())).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
