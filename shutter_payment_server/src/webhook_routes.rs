//! Provider webhook endpoints.
//!
//! Three inbound surfaces, all driven by the payment provider:
//! * `POST /webhook/payment` — payment lifecycle notifications (approved, rejected, refunded, …).
//! * `POST /webhook/transfer-auth` — the provider asks us to authorise a pending outbound transfer.
//! * `POST /webhook/transfer-events` — transfer failures and cancellations.
//!
//! The payment webhook acknowledges with 2xx in every case where a retry would not help (including "already
//! processed" and "unknown order"), and answers an error status only for verification failures and transient
//! provider-fetch failures, which the provider *should* retry.
use actix_web::{web, HttpRequest, HttpResponse};
use gateway_tools::{GatewayApi, PaymentStatus};
use log::*;
use shutter_payment_engine::{
    db_types::{OrderId, SettlementStatus},
    traits::{EngineBackend, TransferInitiator},
    withdrawal_id_from_description,
    LedgerApi,
    LedgerManagement,
    OrderFlowApi,
    PaidOrderOutcome,
    PaymentGatewayError,
    PayoutApi,
};

use crate::{
    config::WebhookSecrets,
    data_objects::{
        JsonResponse,
        PaymentNotification,
        TransferAuthRequest,
        TransferAuthResponse,
        TransferEventRequest,
    },
    errors::ServerError,
    helpers::{verify_webhook_signature, SignatureCheck},
    route,
};

/// Header carrying the static token on transfer webhooks.
const TRANSFER_TOKEN_HEADER: &str = "x-transfer-token";
/// Tolerated difference between the transfer value reported by the provider and the withdrawal amount.
const VALUE_TOLERANCE_CENTS: i64 = 1;

// ------------------------------------------  Payment webhook  ------------------------------------------------
route!(payment_webhook => Post "/webhook/payment" impl EngineBackend);
pub async fn payment_webhook<B: EngineBackend>(
    req: HttpRequest,
    body: web::Json<PaymentNotification>,
    api: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<GatewayApi>,
    secrets: web::Data<WebhookSecrets>,
) -> Result<HttpResponse, ServerError> {
    trace!("🔔️ Received payment webhook: {}", req.uri());
    let secret = secrets.payment_secret.reveal();
    if secret.trim().is_empty() {
        // Running without a webhook secret silently disables authentication; refuse loudly instead.
        error!("🔔️ SPG_WEBHOOK_SECRET is not configured. Rejecting webhook.");
        return Err(ServerError::WebhookNotConfigured);
    }
    let notification = body.into_inner();
    let payment_id = match notification.payment_id() {
        Some(id) => id,
        None => {
            // Some notification topics carry no payment id. That is not an error; acknowledge and move on.
            debug!("🔔️ Notification carries no payment id. Acknowledged without action.");
            return Ok(HttpResponse::Ok().json(JsonResponse::success("No actionable payment id")));
        },
    };
    let x_signature = req.headers().get("x-signature").and_then(|v| v.to_str().ok());
    let x_request_id = req.headers().get("x-request-id").and_then(|v| v.to_str().ok());
    if let SignatureCheck::Invalid(reason) = verify_webhook_signature(x_signature, x_request_id, &payment_id, secret)
    {
        warn!("🔔️ Invalid webhook signature for payment {payment_id}: {reason}");
        return Err(ServerError::InvalidWebhookSignature(reason.to_string()));
    }
    // Never trust the status embedded in the notification body; fetch the authoritative record by id.
    let payment = gateway.fetch_payment(&payment_id).await.map_err(|e| {
        warn!("🔔️ Could not fetch payment {payment_id} from provider: {e}");
        ServerError::from(e)
    })?;
    let order_id = payment.external_reference.clone().map(OrderId);
    let result = match (payment.status, order_id) {
        (PaymentStatus::Approved, Some(order_id)) => match api.payment_approved(&order_id, &payment_id).await {
            Ok(PaidOrderOutcome::Credited { .. }) => JsonResponse::success("Order processed successfully."),
            Ok(PaidOrderOutcome::AlreadyProcessed { .. }) => JsonResponse::success("Already processed"),
            Err(PaymentGatewayError::OrderNotFound(id)) => {
                // A payment referencing an order we never created is an anomaly to alert on, but retrying the
                // webhook cannot fix it.
                error!("🔔️ Payment {payment_id} references unknown order [{id}].");
                JsonResponse::failure(format!("Unknown order {id}"))
            },
            Err(e) => return Err(e.into()),
        },
        (PaymentStatus::Rejected | PaymentStatus::Cancelled, Some(order_id)) => {
            api.payment_rejected(&order_id).await?;
            JsonResponse::success("Order cancelled.")
        },
        (PaymentStatus::Refunded | PaymentStatus::ChargedBack, Some(order_id)) => {
            match api.payment_reversed(&order_id).await {
                Ok(_) => JsonResponse::success("Refund processed."),
                Err(PaymentGatewayError::OrderNotFound(id)) => {
                    error!("🔔️ Refund for payment {payment_id} references unknown order [{id}].");
                    JsonResponse::failure(format!("Unknown order {id}"))
                },
                Err(e) => return Err(e.into()),
            }
        },
        (status, order_id) => {
            debug!("🔔️ Payment {payment_id} has status {status:?} (order: {order_id:?}). No action taken.");
            JsonResponse::success("Acknowledged")
        },
    };
    Ok(HttpResponse::Ok().json(result))
}

// ---------------------------------------  Transfer authorisation  --------------------------------------------
route!(transfer_auth_webhook => Post "/webhook/transfer-auth" impl EngineBackend, TransferInitiator);
/// The provider holds every outbound transfer until this endpoint answers. We approve exactly the transfers we
/// recognise as live withdrawals with a matching amount, and refuse everything else. Refusals for a known
/// withdrawal also fail the withdrawal so the funds return to the seller immediately.
pub async fn transfer_auth_webhook<TEngineBackend, TTransferInitiator>(
    req: HttpRequest,
    body: web::Json<TransferAuthRequest>,
    payouts: web::Data<PayoutApi<TEngineBackend, TTransferInitiator>>,
    ledger: web::Data<LedgerApi<TEngineBackend>>,
    secrets: web::Data<WebhookSecrets>,
) -> HttpResponse
where
    TEngineBackend: EngineBackend,
    TTransferInitiator: TransferInitiator,
{
    if !transfer_token_is_valid(&req, &secrets) {
        warn!("🔔️ Transfer-auth webhook carried an invalid token.");
        return HttpResponse::Ok().json(TransferAuthResponse::refused("Invalid token"));
    }
    let request = body.into_inner();
    let transfer = match (request.kind.as_deref(), request.transfer) {
        (Some("TRANSFER"), Some(transfer)) => transfer,
        _ => {
            return HttpResponse::Ok().json(TransferAuthResponse::refused("Payload is not a TRANSFER"));
        },
    };
    if transfer.status.as_deref() != Some("PENDING") {
        // Nothing for us to hold; let the provider proceed.
        debug!("🔔️ Transfer {:?} is not pending; approving pass-through.", transfer.id);
        return HttpResponse::Ok().json(TransferAuthResponse::approved());
    }
    let withdrawal_id = match transfer.description.as_deref().and_then(withdrawal_id_from_description) {
        Some(id) => id,
        None => {
            warn!("🔔️ Transfer {:?} is not a recognised withdrawal. Refusing.", transfer.id);
            return HttpResponse::Ok().json(TransferAuthResponse::refused("Unrecognised transfer"));
        },
    };
    let withdrawal = match ledger.db().fetch_withdrawal(withdrawal_id).await {
        Ok(Some(w)) => w,
        Ok(None) => {
            warn!("🔔️ Transfer-auth references unknown withdrawal #{withdrawal_id}. Refusing.");
            return HttpResponse::Ok().json(TransferAuthResponse::refused("Unknown withdrawal"));
        },
        Err(e) => {
            error!("🔔️ Could not load withdrawal #{withdrawal_id}: {e}");
            return HttpResponse::Ok().json(TransferAuthResponse::refused("Internal error"));
        },
    };
    if withdrawal.status != SettlementStatus::Pending {
        info!("🔔️ Withdrawal #{withdrawal_id} is already {}; refusing duplicate transfer.", withdrawal.status);
        return HttpResponse::Ok().json(TransferAuthResponse::refused("Withdrawal already settled"));
    }
    let reported_cents = transfer.value.map(|v| (v * 100.0).round() as i64);
    let matches = reported_cents
        .map(|cents| (cents - withdrawal.amount.value()).abs() <= VALUE_TOLERANCE_CENTS)
        .unwrap_or(false);
    if !matches {
        error!(
            "🔔️ Transfer value {:?} does not match withdrawal #{withdrawal_id} amount {}. Refusing and failing \
             the withdrawal.",
            transfer.value, withdrawal.amount
        );
        if let Err(e) = payouts.transfer_refused(withdrawal_id, "Transfer value does not match withdrawal").await {
            error!("🔔️ Could not fail withdrawal #{withdrawal_id}: {e}");
        }
        return HttpResponse::Ok().json(TransferAuthResponse::refused("Transfer value mismatch"));
    }
    match payouts.transfer_approved(withdrawal_id).await {
        Ok(Some(_)) => {
            info!("🔔️ Transfer for withdrawal #{withdrawal_id} authorised.");
            HttpResponse::Ok().json(TransferAuthResponse::approved())
        },
        Ok(None) => {
            // Lost a race with another settlement; the funds have already moved, refuse this transfer.
            HttpResponse::Ok().json(TransferAuthResponse::refused("Withdrawal already settled"))
        },
        Err(e) => {
            error!("🔔️ Could not settle withdrawal #{withdrawal_id}: {e}");
            HttpResponse::Ok().json(TransferAuthResponse::refused("Internal error"))
        },
    }
}

// -----------------------------------------  Transfer events  -------------------------------------------------
route!(transfer_events_webhook => Post "/webhook/transfer-events" impl EngineBackend, TransferInitiator);
/// Failure and cancellation events for transfers that were already authorised. The referenced withdrawal is
/// failed and its funds returned; every other event is acknowledged without action.
pub async fn transfer_events_webhook<TEngineBackend, TTransferInitiator>(
    req: HttpRequest,
    body: web::Json<TransferEventRequest>,
    payouts: web::Data<PayoutApi<TEngineBackend, TTransferInitiator>>,
    secrets: web::Data<WebhookSecrets>,
) -> Result<HttpResponse, ServerError>
where
    TEngineBackend: EngineBackend,
    TTransferInitiator: TransferInitiator,
{
    if !transfer_token_is_valid(&req, &secrets) {
        warn!("🔔️ Transfer-events webhook carried an invalid token.");
        return Err(ServerError::InvalidWebhookSignature("invalid transfer token".into()));
    }
    let request = body.into_inner();
    let (event, transfer) = match (request.event, request.transfer) {
        (Some(event), Some(transfer)) => (event, transfer),
        _ => return Ok(HttpResponse::Ok().json(JsonResponse::success("Acknowledged"))),
    };
    if event != "TRANSFER_FAILED" && event != "TRANSFER_CANCELLED" {
        return Ok(HttpResponse::Ok().json(JsonResponse::success("Acknowledged")));
    }
    let withdrawal_id = match transfer.description.as_deref().and_then(withdrawal_id_from_description) {
        Some(id) => id,
        None => return Ok(HttpResponse::Ok().json(JsonResponse::success("Acknowledged"))),
    };
    let reason = match event.as_str() {
        "TRANSFER_FAILED" => {
            format!("Transfer failed at provider. {}", transfer.fail_reason.as_deref().unwrap_or("")).trim().to_string()
        },
        _ => "Transfer cancelled at provider. Funds returned to balance.".to_string(),
    };
    info!("🔔️ {event} for transfer {:?} (withdrawal #{withdrawal_id})", transfer.id);
    match payouts.transfer_refused(withdrawal_id, &reason).await {
        Ok(_) => Ok(HttpResponse::Ok().json(JsonResponse::success("Withdrawal reversed"))),
        Err(PaymentGatewayError::WithdrawalNotFound(_)) => {
            error!("🔔️ {event} references unknown withdrawal #{withdrawal_id}.");
            Ok(HttpResponse::Ok().json(JsonResponse::failure("Unknown withdrawal")))
        },
        Err(e) => Err(e.into()),
    }
}

fn transfer_token_is_valid(req: &HttpRequest, secrets: &WebhookSecrets) -> bool {
    let expected = secrets.transfer_token.reveal();
    if expected.trim().is_empty() {
        return true;
    }
    req.headers()
        .get(TRANSFER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|received| received == expected.as_str())
        .unwrap_or(false)
}
