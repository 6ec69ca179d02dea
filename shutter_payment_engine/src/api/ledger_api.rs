use std::fmt::Debug;

use serde::Serialize;
use spg_common::Cents;

use crate::{
    db_types::{LedgerEntry, Order, OrderId, OrderItem, SellerBalance, WithdrawalRequest},
    traits::{LedgerManagement, PaymentGatewayError},
};

/// Read-side API over orders, balances and the transaction ledger.
pub struct LedgerApi<B> {
    db: B,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

/// Snapshot of a seller's balance against the signed sum of their ledger. `consistent` is the auditability
/// property: the two always agree unless the store has been tampered with out-of-band.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerAudit {
    pub seller_id: String,
    pub available: Cents,
    pub blocked: Cents,
    pub ledger_total: Cents,
    /// Refund value still owed by this seller, to be settled out of future sale credits.
    pub outstanding_refunds: Cents,
    pub consistent: bool,
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    pub async fn order(&self, order_id: &OrderId) -> Result<Option<(Order, Vec<OrderItem>)>, PaymentGatewayError> {
        let order = match self.db.fetch_order(order_id).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(Some((order, items)))
    }

    /// The seller's balance. Sellers that have never been credited report zero rather than an error.
    pub async fn balance(&self, seller_id: &str) -> Result<(Cents, Cents), PaymentGatewayError> {
        let balance = self.db.fetch_seller_balance(seller_id).await?;
        Ok(balance.map(|b| (b.available, b.blocked)).unwrap_or_default())
    }

    pub async fn balance_record(&self, seller_id: &str) -> Result<Option<SellerBalance>, PaymentGatewayError> {
        self.db.fetch_seller_balance(seller_id).await
    }

    pub async fn history(&self, seller_id: &str) -> Result<Vec<LedgerEntry>, PaymentGatewayError> {
        self.db.fetch_ledger_entries(seller_id).await
    }

    pub async fn withdrawals(&self, seller_id: &str) -> Result<Vec<WithdrawalRequest>, PaymentGatewayError> {
        self.db.fetch_withdrawals(seller_id).await
    }

    pub async fn set_payout_key(&self, seller_id: &str, payout_key: &str) -> Result<(), PaymentGatewayError> {
        self.db.upsert_payout_key(seller_id, payout_key).await
    }

    pub async fn audit(&self, seller_id: &str) -> Result<LedgerAudit, PaymentGatewayError> {
        let (available, blocked) = self.balance(seller_id).await?;
        let ledger_total = self.db.fetch_reconciled_total(seller_id).await?;
        let outstanding_refunds = self.db.fetch_outstanding_shortfall(seller_id).await?;
        Ok(LedgerAudit {
            seller_id: seller_id.to_string(),
            available,
            blocked,
            ledger_total,
            outstanding_refunds,
            consistent: available + blocked == ledger_total,
        })
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
