//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will stop
//! the worker from processing new requests. Any long, non-cpu-bound operation (I/O, database queries, provider
//! calls) must therefore be awaited, never blocked on.
use actix_web::{get, web, HttpResponse, Responder};
use gateway_tools::{CheckoutCustomer, CheckoutItem, CheckoutRequest, GatewayApi};
use log::*;
use shutter_payment_engine::{
    db_types::OrderId,
    traits::{EngineBackend, TransferInitiator},
    LedgerApi,
    OrderFlowApi,
    PayoutApi,
};

use crate::{
    config::ServerOptions,
    data_objects::{CheckoutRequestBody, CheckoutResponse, PayoutKeyBody, WithdrawalRequestBody},
    errors::ServerError,
    helpers::validate_callback_url,
};

// Web-actix cannot handle generics in handlers, so route registration is implemented manually using the `route!`
// macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health   ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------  Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl EngineBackend);
/// Creates a `Pending` order from the submitted cart and opens a hosted checkout session for it at the provider.
/// The callback URLs are validated *before* the provider is called; a misconfigured deployment fails here rather
/// than at the provider.
pub async fn checkout<B: EngineBackend>(
    body: web::Json<CheckoutRequestBody>,
    orders_api: web::Data<OrderFlowApi<B>>,
    ledger_api: web::Data<LedgerApi<B>>,
    gateway: web::Data<GatewayApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("🛒️ POST checkout for buyer {} with {} item(s)", request.buyer_id, request.items.len());
    let urls = &options.checkout_urls;
    validate_callback_url("success_url", &urls.success_url)?;
    validate_callback_url("cancel_url", &urls.cancel_url)?;
    validate_callback_url("expired_url", &urls.expired_url)?;
    if request.items.is_empty() {
        return Err(ServerError::InvalidRequest("Cart is empty".into()));
    }
    let titles: std::collections::HashMap<String, String> = request
        .items
        .iter()
        .filter_map(|i| i.title.clone().map(|t| (i.asset_id.clone(), t)))
        .collect();
    let cart = request.items.into_iter().map(Into::into).collect();
    let order = orders_api.create_order(&request.buyer_id, cart).await?;
    let items = ledger_api
        .order(&order.order_id)
        .await?
        .map(|(_, items)| items)
        .unwrap_or_default();
    let checkout_items = items
        .iter()
        .map(|item| CheckoutItem {
            name: titles.get(&item.asset_id).cloned().unwrap_or_else(|| format!("Photo {}", item.asset_id)),
            description: None,
            quantity: 1,
            value: item.paid_price,
        })
        .collect();
    let session = gateway
        .create_checkout(CheckoutRequest {
            items: checkout_items,
            external_reference: order.order_id.to_string(),
            customer: request.customer.map(|c| CheckoutCustomer { name: c.name, email: c.email }),
            success_url: urls.success_url.clone(),
            cancel_url: urls.cancel_url.clone(),
            expired_url: urls.expired_url.clone(),
            minutes_to_expire: options.checkout_expiry_minutes.max(1) as u32,
        })
        .await
        .map_err(|e| {
            // The order stays Pending; the buyer can retry checkout and webhooks will still find it.
            warn!("🛒️ Could not create checkout session for order [{}]: {e}", order.order_id);
            ServerError::from(e)
        })?;
    info!("🛒️ Checkout session open for order [{}]: {}", order.order_id, session.checkout_url);
    Ok(HttpResponse::Ok().json(CheckoutResponse {
        order_id: order.order_id,
        total: order.total_price,
        checkout_url: session.checkout_url,
    }))
}

// ----------------------------------------------   Orders   ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl EngineBackend);
pub async fn order_by_id<B: EngineBackend>(
    path: web::Path<String>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    trace!("💻️ GET order [{order_id}]");
    let (order, items) = api
        .order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "order": order, "items": items })))
}

// ----------------------------------------------  Sellers   ----------------------------------------------------
route!(seller_balance => Get "/sellers/{seller_id}/balance" impl EngineBackend);
pub async fn seller_balance<B: EngineBackend>(
    path: web::Path<String>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    let (available, blocked) = api.balance(&seller_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "seller_id": seller_id,
        "available": available,
        "blocked": blocked,
    })))
}

route!(seller_ledger => Get "/sellers/{seller_id}/ledger" impl EngineBackend);
pub async fn seller_ledger<B: EngineBackend>(
    path: web::Path<String>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    let entries = api.history(&seller_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(seller_withdrawals => Get "/sellers/{seller_id}/withdrawals" impl EngineBackend);
pub async fn seller_withdrawals<B: EngineBackend>(
    path: web::Path<String>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    let withdrawals = api.withdrawals(&seller_id).await?;
    Ok(HttpResponse::Ok().json(withdrawals))
}

route!(seller_audit => Get "/sellers/{seller_id}/audit" impl EngineBackend);
/// Balance vs. ledger reconciliation for one seller. `consistent` should always be true; an inconsistency means
/// the store was modified outside the engine and needs operator attention.
pub async fn seller_audit<B: EngineBackend>(
    path: web::Path<String>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    let audit = api.audit(&seller_id).await?;
    if !audit.consistent {
        error!("💻️ Ledger inconsistency detected for seller {seller_id}: {audit:?}");
    }
    Ok(HttpResponse::Ok().json(audit))
}

route!(set_payout_key => Put "/sellers/{seller_id}/payout-key" impl EngineBackend);
pub async fn set_payout_key<B: EngineBackend>(
    path: web::Path<String>,
    body: web::Json<PayoutKeyBody>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    let key = body.into_inner().payout_key;
    if key.trim().is_empty() {
        return Err(ServerError::InvalidRequest("payout_key must not be empty".into()));
    }
    api.set_payout_key(&seller_id, key.trim()).await?;
    info!("💻️ Payout key updated for seller {seller_id}");
    Ok(HttpResponse::Ok().finish())
}

// ----------------------------------------------  Payouts   ----------------------------------------------------
route!(request_withdrawal => Post "/payouts" impl EngineBackend, TransferInitiator);
/// Accepts a withdrawal request and immediately tries to initiate the transfer. The response carries the request
/// in its post-initiation state: `Pending` while the provider authorises, or `Failed` (funds already returned) if
/// initiation failed.
pub async fn request_withdrawal<TEngineBackend, TTransferInitiator>(
    body: web::Json<WithdrawalRequestBody>,
    api: web::Data<PayoutApi<TEngineBackend, TTransferInitiator>>,
) -> Result<HttpResponse, ServerError>
where
    TEngineBackend: EngineBackend,
    TTransferInitiator: TransferInitiator,
{
    let request = body.into_inner();
    debug!("💻️ POST withdrawal of {} for seller {}", request.amount, request.seller_id);
    let withdrawal = api.request_and_process(&request.seller_id, request.amount).await?;
    Ok(HttpResponse::Ok().json(withdrawal))
}

route!(retry_withdrawal => Post "/payouts/{id}/retry" impl EngineBackend, TransferInitiator);
/// Retries a failed withdrawal. Funds are re-validated and re-blocked before the transfer is attempted again;
/// insufficient funds at retry time surface as a distinct 422.
pub async fn retry_withdrawal<TEngineBackend, TTransferInitiator>(
    path: web::Path<i64>,
    api: web::Data<PayoutApi<TEngineBackend, TTransferInitiator>>,
) -> Result<HttpResponse, ServerError>
where
    TEngineBackend: EngineBackend,
    TTransferInitiator: TransferInitiator,
{
    let withdrawal_id = path.into_inner();
    debug!("💻️ POST retry for withdrawal #{withdrawal_id}");
    let withdrawal = api.retry_failed_withdrawal(withdrawal_id).await?;
    Ok(HttpResponse::Ok().json(withdrawal))
}
