use serde::{Deserialize, Serialize};
use spg_common::Cents;

//--------------------------------------    PaymentStatus      -------------------------------------------------------
/// The authoritative status of a payment, as reported by the provider's payment-lookup endpoint. Statuses the core
/// does not act on are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
    Pending,
    Other(String),
}

impl From<&str> for PaymentStatus {
    fn from(value: &str) -> Self {
        match value {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            "charged_back" => Self::ChargedBack,
            "pending" | "in_process" => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }
}

//--------------------------------------    PaymentRecord      -------------------------------------------------------
/// Canonical view of a payment at the provider. `external_reference` carries the marketplace order id that was
/// attached when the checkout was created.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub external_reference: Option<String>,
}

/// Wire format of the provider's payment-lookup response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPayment {
    pub id: serde_json::Value,
    pub status: String,
    #[serde(default)]
    pub external_reference: Option<String>,
}

impl From<RawPayment> for PaymentRecord {
    fn from(raw: RawPayment) -> Self {
        // The provider has returned ids both as strings and as numbers over the years.
        let payment_id = match &raw.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self { payment_id, status: PaymentStatus::from(raw.status.as_str()), external_reference: raw.external_reference }
    }
}

//--------------------------------------    Checkout types     -------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    /// Serialized as a decimal amount of whole currency units, which is what the provider expects on the wire.
    #[serde(serialize_with = "serialize_cents_as_decimal")]
    pub value: Cents,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutCustomer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    /// The marketplace order id; echoed back by payment webhooks as `external_reference`.
    pub external_reference: String,
    pub customer: Option<CheckoutCustomer>,
    pub success_url: String,
    pub cancel_url: String,
    pub expired_url: String,
    pub minutes_to_expire: u32,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub checkout_id: String,
    pub checkout_url: String,
}

//--------------------------------------    Transfer types     -------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct TransferReceipt {
    pub id: String,
    pub status: String,
}

/// Money is integer cents everywhere inside the system; the provider wire format wants decimal currency units.
/// This is the only place the conversion happens.
pub(crate) fn serialize_cents_as_decimal<S>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error>
where S: serde::Serializer {
    serializer.serialize_f64(cents.value() as f64 / 100.0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn item_value_is_serialized_as_decimal_units() {
        let item = CheckoutItem {
            name: "Sunset over the bay".into(),
            description: None,
            quantity: 1,
            value: Cents::from(1250),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["value"], serde_json::json!(12.5));
    }

    #[test]
    fn payment_record_normalises_numeric_ids() {
        let raw: RawPayment =
            serde_json::from_value(serde_json::json!({"id": 12345, "status": "approved"})).unwrap();
        let record = PaymentRecord::from(raw);
        assert_eq!(record.payment_id, "12345");
        assert_eq!(record.status, PaymentStatus::Approved);
        assert_eq!(record.external_reference, None);

        let raw: RawPayment = serde_json::from_value(
            serde_json::json!({"id": "pay_9", "status": "charged_back", "external_reference": "ord_1"}),
        )
        .unwrap();
        let record = PaymentRecord::from(raw);
        assert_eq!(record.payment_id, "pay_9");
        assert_eq!(record.status, PaymentStatus::ChargedBack);
        assert_eq!(record.external_reference.as_deref(), Some("ord_1"));
    }

    #[test]
    fn unknown_statuses_are_preserved() {
        assert_eq!(PaymentStatus::from("in_mediation"), PaymentStatus::Other("in_mediation".to_string()));
        assert_eq!(PaymentStatus::from("in_process"), PaymentStatus::Pending);
    }
}
