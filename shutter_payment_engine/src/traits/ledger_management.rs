use crate::{
    db_types::{LedgerEntry, Order, OrderId, OrderItem, SellerBalance, WithdrawalRequest},
    traits::PaymentGatewayError,
};

/// Read-side queries over the ledger, plus the seller payout-key record that withdrawals depend on.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement: Clone {
    /// Fetches an order by its public id. `None` when it does not exist.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Fetches the items of an order, in insertion order.
    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    /// Fetches the seller's balance row. `None` when the seller has never been credited.
    async fn fetch_seller_balance(&self, seller_id: &str) -> Result<Option<SellerBalance>, PaymentGatewayError>;

    /// Fetches the seller's ledger history, newest first.
    async fn fetch_ledger_entries(&self, seller_id: &str) -> Result<Vec<LedgerEntry>, PaymentGatewayError>;

    /// The signed sum of the seller's ledger entries, counting withdrawal rows only once they are `Processed`.
    /// Always equals `available + blocked` for a consistent ledger; exposed so operators can audit that.
    async fn fetch_reconciled_total(&self, seller_id: &str) -> Result<spg_common::Cents, PaymentGatewayError>;

    /// Refund value still owed by the seller: reversals that could not be taken from their balance and will be
    /// settled out of future sale credits.
    async fn fetch_outstanding_shortfall(&self, seller_id: &str) -> Result<spg_common::Cents, PaymentGatewayError>;

    /// Fetches the seller's withdrawal requests, newest first.
    async fn fetch_withdrawals(&self, seller_id: &str) -> Result<Vec<WithdrawalRequest>, PaymentGatewayError>;

    /// Fetches one withdrawal request by id.
    async fn fetch_withdrawal(&self, withdrawal_id: i64) -> Result<Option<WithdrawalRequest>, PaymentGatewayError>;

    /// Fetches the payout key on file for the seller, if any.
    async fn fetch_payout_key(&self, seller_id: &str) -> Result<Option<String>, PaymentGatewayError>;

    /// Stores (or replaces) the payout key on file for the seller.
    async fn upsert_payout_key(&self, seller_id: &str, payout_key: &str) -> Result<(), PaymentGatewayError>;
}
