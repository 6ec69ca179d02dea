use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use spg_common::Cents;

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        -------------------------------------------------------
/// Opaque public identifier of an order, e.g. `ord_h4x0rv91kq3p`. This is the identifier shared with the payment
/// provider (as the external reference of a checkout) and with buyers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a fresh order id with the `ord_` prefix.
    pub fn random() -> Self {
        use rand::distributions::{Alphanumeric, DistString};
        let suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), 12).to_lowercase();
        Self(format!("ord_{suffix}"))
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created and no (successful) payment has been received yet.
    Pending,
    /// The payment provider reported an approved payment and the sellers have been credited.
    Paid,
    /// The payment was rejected or cancelled, or a paid order was refunded / charged back.
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub total_price: Cents,
    pub status: OrderStatusType,
    pub external_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order as submitted by checkout, before it has been persisted. The item prices have already been fixed by the
/// pricing engine and are never recomputed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub total_price: Cents,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(buyer_id: String, items: Vec<NewOrderItem>) -> Self {
        let total_price = items.iter().map(|i| i.paid_price).sum();
        Self { order_id: OrderId::random(), buyer_id, total_price, items }
    }
}

//--------------------------------------      OrderItem        -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub asset_id: String,
    pub seller_id: String,
    pub collection_id: Option<String>,
    /// The price charged for this item, frozen at order creation.
    pub paid_price: Cents,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub asset_id: String,
    pub seller_id: String,
    pub collection_id: Option<String>,
    pub paid_price: Cents,
}

//--------------------------------------    SellerBalance      -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SellerBalance {
    pub seller_id: String,
    /// Funds eligible for withdrawal.
    pub available: Cents,
    /// Funds earmarked for an in-flight withdrawal.
    pub blocked: Cents,
    pub updated_at: DateTime<Utc>,
}

impl SellerBalance {
    /// Total seller equity currently held by the platform.
    pub fn total(&self) -> Cents {
        self.available + self.blocked
    }
}

//--------------------------------------    LedgerEntryKind    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerEntryKind {
    Sale,
    Refund,
    Withdrawal,
}

impl Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntryKind::Sale => write!(f, "Sale"),
            LedgerEntryKind::Refund => write!(f, "Refund"),
            LedgerEntryKind::Withdrawal => write!(f, "Withdrawal"),
        }
    }
}

//--------------------------------------   SettlementStatus    -------------------------------------------------------
/// Settlement state of a withdrawal-linked record. Only meaningful for `Withdrawal` ledger entries and for
/// [`WithdrawalRequest`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SettlementStatus {
    Pending,
    Processed,
    Failed,
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementStatus::Pending => write!(f, "Pending"),
            SettlementStatus::Processed => write!(f, "Processed"),
            SettlementStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for SettlementStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processed" => Ok(Self::Processed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid settlement status: {s}"))),
        }
    }
}

//--------------------------------------      LedgerEntry      -------------------------------------------------------
/// Append-only ledger row. Never updated after insertion, with one exception: the `status` field of
/// withdrawal-linked entries tracks the withdrawal's settlement.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub seller_id: String,
    pub kind: LedgerEntryKind,
    /// Signed amount in cents. Sales are positive; refunds and withdrawals are negative.
    pub amount: Cents,
    pub order_id: Option<OrderId>,
    pub withdrawal_id: Option<i64>,
    pub status: Option<SettlementStatus>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

//-------------------------------------- WithdrawalRequest     -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: i64,
    pub seller_id: String,
    pub amount: Cents,
    /// Bank routing information (e.g. a PIX key) captured at request time.
    pub payout_key: String,
    pub status: SettlementStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

//--------------------------------------      SaleCredit       -------------------------------------------------------
/// One seller credit produced while marking an order paid. Returned so that callers can notify sellers after the
/// transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleCredit {
    pub seller_id: String,
    pub asset_id: String,
    pub gross: Cents,
    pub credited: Cents,
}

/// One seller debit produced while reversing a paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReversal {
    pub seller_id: String,
    pub asset_id: String,
    /// The portion actually taken from the seller's available balance.
    pub reversed: Cents,
    /// The portion that could not be taken and was recorded as a shortfall.
    pub shortfall: Cents,
}
