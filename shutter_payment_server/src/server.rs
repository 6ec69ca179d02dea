use std::time::Duration;

use actix_web::{http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::GatewayApi;
use log::info;
use shutter_payment_engine::{db, events::EventHandlers, LedgerApi, OrderFlowApi, PayoutApi, SqliteDatabase};

use crate::{
    config::{ServerConfig, ServerOptions, WebhookSecrets},
    errors::ServerError,
    integrations::GatewayTransferInitiator,
    notifications::notification_hooks,
    routes::{
        health,
        CheckoutRoute,
        OrderByIdRoute,
        RequestWithdrawalRoute,
        RetryWithdrawalRoute,
        SellerAuditRoute,
        SellerBalanceRoute,
        SellerLedgerRoute,
        SellerWithdrawalsRoute,
        SetPayoutKeyRoute,
    },
    webhook_routes::{PaymentWebhookRoute, TransferAuthWebhookRoute, TransferEventsWebhookRoute},
};

const EVENT_BUFFER_SIZE: usize = 100;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db::run_migrations(db.pool()).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::InitializeError(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
) -> Result<actix_web::dev::Server, ServerError> {
    let gateway = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks());
    let producers = handlers.producers();
    tokio::spawn(async move {
        handlers.start_handlers().await;
    });
    info!("💻️ Starting ShutterPay server on {}:{}", config.host, config.port);
    let options = ServerOptions::from_config(&config);
    let secrets = WebhookSecrets::from_config(&config);
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(
            db.clone(),
            options.platform_fee_percent,
            options.default_asset_price,
            producers.clone(),
        );
        let ledger_api = LedgerApi::new(db.clone());
        let transfers = GatewayTransferInitiator::new(gateway.clone());
        let payout_api = PayoutApi::new(db.clone(), transfers, options.min_withdrawal, producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(payout_api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(options.clone()))
            .app_data(web::Data::new(secrets.clone()))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(SellerBalanceRoute::<SqliteDatabase>::new())
            .service(SellerLedgerRoute::<SqliteDatabase>::new())
            .service(SellerWithdrawalsRoute::<SqliteDatabase>::new())
            .service(SellerAuditRoute::<SqliteDatabase>::new())
            .service(SetPayoutKeyRoute::<SqliteDatabase>::new())
            .service(RequestWithdrawalRoute::<SqliteDatabase, GatewayTransferInitiator>::new())
            .service(RetryWithdrawalRoute::<SqliteDatabase, GatewayTransferInitiator>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase>::new())
            .service(TransferAuthWebhookRoute::<SqliteDatabase, GatewayTransferInitiator>::new())
            .service(TransferEventsWebhookRoute::<SqliteDatabase, GatewayTransferInitiator>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
