//! `SqliteDatabase` is a concrete implementation of a ShutterPay payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every multi-entity mutation runs in one `sqlx` transaction; the conditional updates in the low-level
//! [`super::db`] functions are the only idempotency and sufficient-funds oracles.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{balances, counters, ledger, new_pool, orders, sellers, shortfalls, withdrawals};
use crate::{
    db_types::{
        Cents,
        LedgerEntry,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        SaleCredit,
        SaleReversal,
        SellerBalance,
        SettlementStatus,
        WithdrawalRequest,
    },
    traits::{LedgerManagement, PaidOrderOutcome, PaymentGatewayDatabase, PaymentGatewayError, RefundOutcome},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        if order.items.is_empty() {
            return Err(PaymentGatewayError::EmptyOrder(order.order_id));
        }
        let mut tx = self.pool.begin().await?;
        let (order, inserted) = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok((order, inserted))
    }

    async fn confirm_order_paid(
        &self,
        order_id: &OrderId,
        external_payment_id: &str,
        fee_percent: i64,
    ) -> Result<PaidOrderOutcome, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let first_time = orders::mark_paid_if_unpaid(order_id, external_payment_id, &mut tx).await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        if !first_time {
            debug!("🗃️ Order [{order_id}] is already paid. No crediting to do.");
            tx.commit().await?;
            return Ok(PaidOrderOutcome::AlreadyProcessed { order });
        }
        let items = orders::fetch_items_for_order(order_id, &mut tx).await?;
        let mut credits = Vec::with_capacity(items.len());
        for item in &items {
            let share = item.paid_price.seller_share(fee_percent);
            // Outstanding refund shortfalls are settled out of this credit first; the seller's balance only grows
            // by what is left over, and each settled portion gets its own Refund ledger row.
            let settlements = shortfalls::settle_up_to(&item.seller_id, share, &mut tx).await?;
            let settled: Cents = settlements.iter().map(|(_, amount)| *amount).sum();
            balances::credit_available(&item.seller_id, share - settled, &mut tx).await?;
            let note = format!("Sale of asset {} (order {order_id})", item.asset_id);
            ledger::append_sale(&item.seller_id, order_id, share, &note, &mut tx).await?;
            for (shortfall_order, amount) in &settlements {
                let note = format!("Deferred refund settlement (order {shortfall_order})");
                ledger::append_refund(
                    &item.seller_id,
                    &OrderId(shortfall_order.clone()),
                    -*amount,
                    &note,
                    &mut tx,
                )
                .await?;
            }
            counters::increment("asset", &item.asset_id, &mut tx).await?;
            if let Some(collection_id) = &item.collection_id {
                counters::increment("collection", collection_id, &mut tx).await?;
            }
            trace!("🗃️ Seller {} credited {share} for asset {}", item.seller_id, item.asset_id);
            credits.push(SaleCredit {
                seller_id: item.seller_id.clone(),
                asset_id: item.asset_id.clone(),
                gross: item.paid_price,
                credited: share,
            });
        }
        tx.commit().await?;
        debug!("🗃️ Order [{order_id}] marked as paid. {} seller credit(s) applied.", credits.len());
        Ok(PaidOrderOutcome::Credited { order, credits })
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let cancelled = orders::cancel_if_pending(order_id, &mut tx).await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        if cancelled {
            debug!("🗃️ Order [{order_id}] cancelled.");
            Ok(Some(order))
        } else {
            debug!("🗃️ Order [{order_id}] was not pending ({}); cancel is a no-op.", order.status);
            Ok(None)
        }
    }

    async fn reverse_order_sales(
        &self,
        order_id: &OrderId,
        fee_percent: i64,
    ) -> Result<RefundOutcome, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let first_time = orders::cancel_if_paid(order_id, &mut tx).await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        if !first_time {
            debug!("🗃️ Order [{order_id}] is not in Paid status ({}); refund is a no-op.", order.status);
            tx.commit().await?;
            return Ok(RefundOutcome::NotReversible { order });
        }
        let items = orders::fetch_items_for_order(order_id, &mut tx).await?;
        let mut reversals = Vec::with_capacity(items.len());
        for item in &items {
            let share = item.paid_price.seller_share(fee_percent);
            let available = balances::fetch_balance(&item.seller_id, &mut tx)
                .await?
                .map(|b| b.available)
                .unwrap_or_default();
            // Clamp at zero: the seller may have withdrawn the proceeds already. The uncovered remainder becomes
            // a receivable, settled out of their future sale credits.
            let applied = share.min(available);
            if applied.is_positive() {
                balances::debit_available_if_sufficient(&item.seller_id, applied, &mut tx).await?;
            }
            let shortfall = share - applied;
            let note = if shortfall.is_positive() {
                shortfalls::record(&item.seller_id, order_id.as_str(), shortfall, &mut tx).await?;
                warn!(
                    "🗃️ Seller {} could only cover {applied} of a {share} reversal for order [{order_id}]. \
                     {shortfall} recorded as receivable.",
                    item.seller_id
                );
                format!("Refund of asset {} (order {order_id}); {shortfall} deferred", item.asset_id)
            } else {
                format!("Refund of asset {} (order {order_id})", item.asset_id)
            };
            ledger::append_refund(&item.seller_id, order_id, -applied, &note, &mut tx).await?;
            reversals.push(SaleReversal {
                seller_id: item.seller_id.clone(),
                asset_id: item.asset_id.clone(),
                reversed: applied,
                shortfall,
            });
        }
        tx.commit().await?;
        debug!("🗃️ Order [{order_id}] refunded. {} seller reversal(s) applied.", reversals.len());
        Ok(RefundOutcome::Reversed { order, reversals })
    }

    async fn create_withdrawal(
        &self,
        seller_id: &str,
        amount: Cents,
        payout_key: &str,
    ) -> Result<WithdrawalRequest, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let blocked = balances::block_if_sufficient(seller_id, amount, &mut tx).await?;
        if !blocked {
            return Err(PaymentGatewayError::InsufficientFunds(seller_id.to_string()));
        }
        let request = withdrawals::insert_request(seller_id, amount, payout_key, &mut tx).await?;
        ledger::append_withdrawal(seller_id, request.id, amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Withdrawal #{} created for seller {seller_id}: {amount} blocked.", request.id);
        Ok(request)
    }

    async fn settle_withdrawal(&self, withdrawal_id: i64) -> Result<Option<WithdrawalRequest>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let request = withdrawals::fetch_request(withdrawal_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::WithdrawalNotFound(withdrawal_id))?;
        let settled = withdrawals::mark_processed_if_pending(withdrawal_id, "Transfer approved", &mut tx).await?;
        if !settled {
            debug!("🗃️ Withdrawal #{withdrawal_id} is not pending ({}); settle is a no-op.", request.status);
            tx.commit().await?;
            return Ok(None);
        }
        ledger::update_withdrawal_status(withdrawal_id, SettlementStatus::Processed, &mut tx).await?;
        balances::release_blocked(&request.seller_id, request.amount, &mut tx).await?;
        let request = withdrawals::fetch_request(withdrawal_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::WithdrawalNotFound(withdrawal_id))?;
        tx.commit().await?;
        debug!("🗃️ Withdrawal #{withdrawal_id} settled. {} has left the platform.", request.amount);
        Ok(Some(request))
    }

    async fn fail_withdrawal(
        &self,
        withdrawal_id: i64,
        note: &str,
    ) -> Result<Option<WithdrawalRequest>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let request = withdrawals::fetch_request(withdrawal_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::WithdrawalNotFound(withdrawal_id))?;
        let failed = withdrawals::mark_failed_if_pending(withdrawal_id, note, &mut tx).await?;
        if !failed {
            debug!("🗃️ Withdrawal #{withdrawal_id} is not pending ({}); fail is a no-op.", request.status);
            tx.commit().await?;
            return Ok(None);
        }
        ledger::update_withdrawal_status(withdrawal_id, SettlementStatus::Failed, &mut tx).await?;
        balances::unblock(&request.seller_id, request.amount, &mut tx).await?;
        let request = withdrawals::fetch_request(withdrawal_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::WithdrawalNotFound(withdrawal_id))?;
        tx.commit().await?;
        debug!("🗃️ Withdrawal #{withdrawal_id} failed. {} returned to available.", request.amount);
        Ok(Some(request))
    }

    async fn reopen_withdrawal(&self, withdrawal_id: i64) -> Result<WithdrawalRequest, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let request = withdrawals::fetch_request(withdrawal_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::WithdrawalNotFound(withdrawal_id))?;
        if request.status != SettlementStatus::Failed {
            return Err(PaymentGatewayError::WithdrawalNotRetryable(withdrawal_id));
        }
        // The balance may have shrunk since the failure (e.g. a refund landed), so the funds check must run again.
        let blocked = balances::block_if_sufficient(&request.seller_id, request.amount, &mut tx).await?;
        if !blocked {
            return Err(PaymentGatewayError::InsufficientFundsForRetry(request.seller_id));
        }
        let reopened = withdrawals::reopen_if_failed(withdrawal_id, &mut tx).await?;
        if !reopened {
            // A concurrent retry won the race; dropping the transaction undoes the re-block.
            return Err(PaymentGatewayError::WithdrawalNotRetryable(withdrawal_id));
        }
        ledger::update_withdrawal_status(withdrawal_id, SettlementStatus::Pending, &mut tx).await?;
        let request = withdrawals::fetch_request(withdrawal_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::WithdrawalNotFound(withdrawal_id))?;
        tx.commit().await?;
        debug!("🗃️ Withdrawal #{withdrawal_id} reopened for retry. {} re-blocked.", request.amount);
        Ok(request)
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_items_for_order(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_seller_balance(&self, seller_id: &str) -> Result<Option<SellerBalance>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let balance = balances::fetch_balance(seller_id, &mut conn).await?;
        Ok(balance)
    }

    async fn fetch_ledger_entries(&self, seller_id: &str) -> Result<Vec<LedgerEntry>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let entries = ledger::history_for_seller(seller_id, &mut conn).await?;
        Ok(entries)
    }

    async fn fetch_reconciled_total(&self, seller_id: &str) -> Result<Cents, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let total = ledger::reconciled_balance(seller_id, &mut conn).await?;
        Ok(total)
    }

    async fn fetch_outstanding_shortfall(&self, seller_id: &str) -> Result<Cents, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let outstanding = shortfalls::outstanding_for_seller(seller_id, &mut conn).await?;
        Ok(outstanding)
    }

    async fn fetch_withdrawals(&self, seller_id: &str) -> Result<Vec<WithdrawalRequest>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let requests = withdrawals::fetch_requests_for_seller(seller_id, &mut conn).await?;
        Ok(requests)
    }

    async fn fetch_withdrawal(&self, withdrawal_id: i64) -> Result<Option<WithdrawalRequest>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let request = withdrawals::fetch_request(withdrawal_id, &mut conn).await?;
        Ok(request)
    }

    async fn fetch_payout_key(&self, seller_id: &str) -> Result<Option<String>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let key = sellers::fetch_payout_key(seller_id, &mut conn).await?;
        Ok(key)
    }

    async fn upsert_payout_key(&self, seller_id: &str, payout_key: &str) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        sellers::upsert_payout_key(seller_id, payout_key, &mut conn).await?;
        Ok(())
    }
}
