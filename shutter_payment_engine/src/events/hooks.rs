use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderAnnulledEvent,
    OrderPaidEvent,
    SaleReversedEvent,
    WithdrawalSettledEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub sale_reversed_producer: Vec<EventProducer<SaleReversedEvent>>,
    pub withdrawal_settled_producer: Vec<EventProducer<WithdrawalSettledEvent>>,
}

pub struct EventHandlers {
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_sale_reversed: Option<EventHandler<SaleReversedEvent>>,
    pub on_withdrawal_settled: Option<EventHandler<WithdrawalSettledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_paid = hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_order_annulled = hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f));
        let on_sale_reversed = hooks.on_sale_reversed.map(|f| EventHandler::new(buffer_size, f));
        let on_withdrawal_settled = hooks.on_withdrawal_settled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_paid, on_order_annulled, on_sale_reversed, on_withdrawal_settled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_sale_reversed {
            result.sale_reversed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_withdrawal_settled {
            result.withdrawal_settled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_sale_reversed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_withdrawal_settled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_sale_reversed: Option<Handler<SaleReversedEvent>>,
    pub on_withdrawal_settled: Option<Handler<WithdrawalSettledEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_sale_reversed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SaleReversedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_sale_reversed = Some(Arc::new(f));
        self
    }

    pub fn on_withdrawal_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WithdrawalSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_withdrawal_settled = Some(Arc::new(f));
        self
    }
}
