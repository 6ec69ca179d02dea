use serde::{Deserialize, Serialize};
use serde_json::Value;
use shutter_payment_engine::{
    db_types::OrderId,
    pricing::{CartItem, CollectionPricing, VolumeTier},
};
use spg_common::Cents;

//--------------------------------------     JsonResponse      -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self { success: false, message: message.into() }
    }
}

//-------------------------------------- Payment notifications -------------------------------------------------------
/// The provider has shipped two webhook payload generations. Both are parsed here and normalised to the payment id
/// before any business logic runs; handlers never branch on raw payload shape.
///
/// * current: `{"type": "payment", "data": {"id": 123}}`
/// * legacy: `{"topic": "payment", "resource": "https://api.../v1/payments/123"}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PaymentNotification {
    Current {
        #[serde(rename = "type")]
        kind: String,
        data: NotificationData,
    },
    Legacy {
        topic: String,
        resource: Value,
    },
    /// Notifications that carry no actionable payment id (seller onboarding events, test pings, …). These are
    /// acknowledged and dropped.
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    pub id: Value,
}

impl PaymentNotification {
    /// The external payment id this notification refers to, if any.
    pub fn payment_id(&self) -> Option<String> {
        match self {
            PaymentNotification::Current { kind, data } if kind == "payment" => Some(value_to_id(&data.id)),
            PaymentNotification::Legacy { topic, resource } if topic == "payment" => match resource {
                Value::String(s) if s.contains('/') => s.rsplit('/').next().map(str::to_string),
                other => Some(value_to_id(other)),
            },
            _ => None,
        }
    }
}

fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//--------------------------------------  Transfer webhooks    -------------------------------------------------------
/// Body of the provider's transfer-authorisation webhook: the provider holds the transfer until we answer
/// APPROVED or REFUSED.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferAuthRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub transfer: Option<TransferDetails>,
}

/// Body of the provider's transfer-events webhook (failures and cancellations).
#[derive(Debug, Clone, Deserialize)]
pub struct TransferEventRequest {
    #[serde(default)]
    pub event: Option<String>,
    pub transfer: Option<TransferDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferDetails {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "failReason", default)]
    pub fail_reason: Option<String>,
}

/// Our answer to the transfer-authorisation webhook. Always delivered with HTTP 200; the `status` field carries
/// the decision.
#[derive(Debug, Clone, Serialize)]
pub struct TransferAuthResponse {
    pub status: &'static str,
    #[serde(rename = "refuseReason", skip_serializing_if = "Option::is_none")]
    pub refuse_reason: Option<String>,
}

impl TransferAuthResponse {
    pub fn approved() -> Self {
        Self { status: "APPROVED", refuse_reason: None }
    }

    pub fn refused<S: Into<String>>(reason: S) -> Self {
        Self { status: "REFUSED", refuse_reason: Some(reason.into()) }
    }
}

//--------------------------------------    Checkout DTOs      -------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequestBody {
    pub buyer_id: String,
    #[serde(default)]
    pub customer: Option<CustomerBody>,
    pub items: Vec<CartItemBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerBody {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemBody {
    pub asset_id: String,
    pub seller_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub license_price: Option<Cents>,
    #[serde(default)]
    pub collection: Option<CollectionBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionBody {
    pub collection_id: String,
    #[serde(default)]
    pub base_price: Option<Cents>,
    #[serde(default)]
    pub tiers: Vec<TierBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierBody {
    pub min_quantity: u32,
    pub price: Cents,
}

impl From<CartItemBody> for CartItem {
    fn from(body: CartItemBody) -> Self {
        CartItem {
            asset_id: body.asset_id,
            seller_id: body.seller_id,
            license_price: body.license_price,
            collection: body.collection.map(|c| CollectionPricing {
                collection_id: c.collection_id,
                base_price: c.base_price,
                tiers: c.tiers.into_iter().map(|t| VolumeTier { min_quantity: t.min_quantity, price: t.price }).collect(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub total: Cents,
    pub checkout_url: String,
}

//--------------------------------------     Payout DTOs       -------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequestBody {
    pub seller_id: String,
    pub amount: Cents,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayoutKeyBody {
    pub payout_key: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn current_payload_shape_yields_payment_id() {
        let body = serde_json::json!({"type": "payment", "data": {"id": 4242}});
        let notification: PaymentNotification = serde_json::from_value(body).unwrap();
        assert_eq!(notification.payment_id().as_deref(), Some("4242"));

        let body = serde_json::json!({"type": "payment", "data": {"id": "pay_77"}});
        let notification: PaymentNotification = serde_json::from_value(body).unwrap();
        assert_eq!(notification.payment_id().as_deref(), Some("pay_77"));
    }

    #[test]
    fn legacy_payload_shape_yields_payment_id() {
        let body = serde_json::json!({"topic": "payment", "resource": "https://api.example.com/v1/payments/987"});
        let notification: PaymentNotification = serde_json::from_value(body).unwrap();
        assert_eq!(notification.payment_id().as_deref(), Some("987"));

        let body = serde_json::json!({"topic": "payment", "resource": "987"});
        let notification: PaymentNotification = serde_json::from_value(body).unwrap();
        assert_eq!(notification.payment_id().as_deref(), Some("987"));
    }

    #[test]
    fn non_payment_notifications_carry_no_id() {
        let body = serde_json::json!({"type": "plan", "data": {"id": 1}});
        let notification: PaymentNotification = serde_json::from_value(body).unwrap();
        assert_eq!(notification.payment_id(), None);

        let body = serde_json::json!({"topic": "merchant_order", "resource": "https://x/1"});
        let notification: PaymentNotification = serde_json::from_value(body).unwrap();
        assert_eq!(notification.payment_id(), None);

        let body = serde_json::json!({"hello": "world"});
        let notification: PaymentNotification = serde_json::from_value(body).unwrap();
        assert_eq!(notification.payment_id(), None);
    }
}
