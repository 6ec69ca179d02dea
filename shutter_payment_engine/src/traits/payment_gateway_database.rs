use thiserror::Error;

use crate::db_types::{
    Cents,
    NewOrder,
    Order,
    OrderId,
    SaleCredit,
    SaleReversal,
    WithdrawalRequest,
};

/// Result of attempting to mark an order as paid.
#[derive(Debug, Clone)]
pub enum PaidOrderOutcome {
    /// This call won the conditional update and performed the financial side effects.
    Credited { order: Order, credits: Vec<SaleCredit> },
    /// The order was already `Paid`. Nothing was mutated; duplicate webhook deliveries land here.
    AlreadyProcessed { order: Order },
}

/// Result of attempting to reverse a paid order's sales.
#[derive(Debug, Clone)]
pub enum RefundOutcome {
    /// This call won the conditional update and reversed the seller credits.
    Reversed { order: Order, reversals: Vec<SaleReversal> },
    /// The order was not in `Paid` status (never paid, or the refund was already applied). Nothing was mutated.
    NotReversible { order: Order },
}

/// This trait defines the financial state transitions a backend must support for the ShutterPay engine.
///
/// Every method that touches more than one row executes as a single atomic transaction. The idempotency and
/// sufficient-funds decisions are made by conditional updates inside those transactions; implementations must not
/// substitute read-then-write checks.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Persists a new order and its items atomically. The call is idempotent on `order_id`: if the order already
    /// exists it is returned unchanged and the second element is `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;

    /// Marks the order as paid and credits every involved seller, in one atomic transaction:
    /// * conditional update `status = 'Paid' WHERE order_id = ? AND status <> 'Paid'` — the affected-row count is
    ///   the idempotency oracle;
    /// * on a zero count the order is untouched and [`PaidOrderOutcome::AlreadyProcessed`] is returned;
    /// * otherwise each seller is credited their commission-adjusted share (settling any outstanding refund
    ///   shortfall first), a `Sale` ledger row is appended per item, and the asset/collection sale counters are
    ///   incremented.
    async fn confirm_order_paid(
        &self,
        order_id: &OrderId,
        external_payment_id: &str,
        fee_percent: i64,
    ) -> Result<PaidOrderOutcome, PaymentGatewayError>;

    /// Conditional transition `Pending -> Cancelled`. Returns the order when the transition happened, `None` when
    /// the order was not `Pending` (cancelling twice is a no-op, not an error).
    async fn cancel_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Reverses the seller credits of a paid order (refund / chargeback), in one atomic transaction. The
    /// conditional update `status = 'Cancelled' WHERE order_id = ? AND status = 'Paid'` is the idempotency oracle,
    /// so replaying a refund webhook cannot double-debit a seller.
    ///
    /// Each seller's available balance is reduced by `min(share, available)`; any remainder is recorded in the
    /// refund-shortfall table and settled out of the seller's future sale credits.
    async fn reverse_order_sales(
        &self,
        order_id: &OrderId,
        fee_percent: i64,
    ) -> Result<RefundOutcome, PaymentGatewayError>;

    /// Creates a withdrawal request, in one atomic transaction:
    /// * conditional balance move `available -= amount, blocked += amount WHERE seller_id = ? AND
    ///   available >= amount` — a zero row count means insufficient funds and nothing is mutated;
    /// * the request row is created in `Pending`;
    /// * a `Withdrawal` ledger row (negative amount, status `Pending`) is appended.
    async fn create_withdrawal(
        &self,
        seller_id: &str,
        amount: Cents,
        payout_key: &str,
    ) -> Result<WithdrawalRequest, PaymentGatewayError>;

    /// Settles a withdrawal after the transfer provider approved it: conditional `Pending -> Processed` (the
    /// idempotency guard), ledger row to `Processed`, and `blocked -= amount`. The funds leave the platform; there
    /// is no corresponding credit. Returns `None` when the request was not `Pending`.
    async fn settle_withdrawal(&self, withdrawal_id: i64) -> Result<Option<WithdrawalRequest>, PaymentGatewayError>;

    /// Fails a withdrawal and returns the funds: conditional `Pending -> Failed`, ledger row to `Failed`,
    /// `blocked -= amount`, `available += amount`. Returns `None` when the request was not `Pending`.
    async fn fail_withdrawal(
        &self,
        withdrawal_id: i64,
        note: &str,
    ) -> Result<Option<WithdrawalRequest>, PaymentGatewayError>;

    /// Re-opens a failed withdrawal for retry: re-blocks the funds with the same conditional update used by
    /// [`create_withdrawal`] (the balance may have changed since the failure), then conditional
    /// `Failed -> Pending` on the request and its ledger row.
    ///
    /// Fails with [`PaymentGatewayError::InsufficientFundsForRetry`] when the seller no longer has the funds, and
    /// with [`PaymentGatewayError::WithdrawalNotRetryable`] when the request is not in `Failed` status.
    async fn reopen_withdrawal(&self, withdrawal_id: i64) -> Result<WithdrawalRequest, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} has no items; cannot be processed")]
    EmptyOrder(OrderId),
    #[error("The requested withdrawal #{0} does not exist")]
    WithdrawalNotFound(i64),
    #[error("Withdrawal #{0} is not in Failed status and cannot be retried")]
    WithdrawalNotRetryable(i64),
    #[error("Seller {0} has insufficient available funds for this withdrawal")]
    InsufficientFunds(String),
    #[error("Seller {0} no longer has sufficient available funds to retry this withdrawal")]
    InsufficientFundsForRetry(String),
    #[error("Withdrawal amount {amount} is below the platform minimum of {minimum}")]
    BelowMinimumWithdrawal { amount: Cents, minimum: Cents },
    #[error("Seller {0} has no payout key on file")]
    NoPayoutKey(String),
    #[error("The requested seller {0} has no balance record")]
    SellerNotFound(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
