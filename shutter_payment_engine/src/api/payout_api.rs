use std::fmt::Debug;

use log::*;
use spg_common::Cents;

use crate::{
    db_types::{SettlementStatus, WithdrawalRequest},
    events::{EventProducers, WithdrawalSettledEvent},
    traits::{LedgerManagement, PaymentGatewayDatabase, PaymentGatewayError, TransferInitiator},
};

/// Transfers created at the provider carry this description so the transfer webhooks can be matched back to the
/// withdrawal they settle.
pub const TRANSFER_DESCRIPTION_PREFIX: &str = "ShutterPay withdrawal #";

/// Extracts the withdrawal id from a transfer description, if it is one of ours.
pub fn withdrawal_id_from_description(description: &str) -> Option<i64> {
    description.trim().strip_prefix(TRANSFER_DESCRIPTION_PREFIX).and_then(|id| id.trim().parse::<i64>().ok())
}

/// `PayoutApi` drives a seller withdrawal through its state machine:
/// `Pending -> {Processed, Failed}`, with `Failed -> Pending` on explicit retry.
///
/// Funds move `available -> blocked` when the request is accepted, and leave `blocked` permanently on settlement
/// or return to `available` on failure. The transfer provider only ever *initiates* transfers here; settlement
/// arrives asynchronously via [`Self::transfer_approved`] / [`Self::transfer_refused`].
pub struct PayoutApi<B, T> {
    db: B,
    transfers: T,
    min_withdrawal: Cents,
    producers: EventProducers,
}

impl<B, T> Debug for PayoutApi<B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B, T> PayoutApi<B, T> {
    pub fn new(db: B, transfers: T, min_withdrawal: Cents, producers: EventProducers) -> Self {
        Self { db, transfers, min_withdrawal, producers }
    }
}

impl<B, T> PayoutApi<B, T>
where
    B: PaymentGatewayDatabase + LedgerManagement,
    T: TransferInitiator,
{
    /// Accepts a withdrawal request: validates the amount against the platform minimum and requires a payout key
    /// on file, then atomically moves the funds `available -> blocked` and records the request. The funds check
    /// happens inside the database as a conditional update, so a racing refund cannot be overdrawn against.
    pub async fn request_withdrawal(
        &self,
        seller_id: &str,
        amount: Cents,
    ) -> Result<WithdrawalRequest, PaymentGatewayError> {
        if amount < self.min_withdrawal {
            return Err(PaymentGatewayError::BelowMinimumWithdrawal { amount, minimum: self.min_withdrawal });
        }
        let payout_key = self
            .db
            .fetch_payout_key(seller_id)
            .await?
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PaymentGatewayError::NoPayoutKey(seller_id.to_string()))?;
        let request = self.db.create_withdrawal(seller_id, amount, &payout_key).await?;
        info!("💸️ Withdrawal #{} requested by seller {seller_id}: {amount}", request.id);
        Ok(request)
    }

    /// Convenience flow used by the withdrawal endpoint: accept the request, then immediately try to initiate the
    /// transfer. The returned request reflects the post-initiation state (`Pending` on success, `Failed` when the
    /// initiation call failed and the funds were returned).
    pub async fn request_and_process(
        &self,
        seller_id: &str,
        amount: Cents,
    ) -> Result<WithdrawalRequest, PaymentGatewayError> {
        let request = self.request_withdrawal(seller_id, amount).await?;
        self.process_pending_withdrawal(request.id).await
    }

    /// Initiates the transfer for a pending withdrawal. If the initiation call fails (provider rejection, network
    /// error, timeout), the withdrawal is failed and fully reversed in one transaction. On success the request
    /// stays `Pending`; final settlement arrives through the provider's authorisation callback.
    pub async fn process_pending_withdrawal(&self, withdrawal_id: i64) -> Result<WithdrawalRequest, PaymentGatewayError> {
        let request = self
            .db
            .fetch_withdrawal(withdrawal_id)
            .await?
            .ok_or(PaymentGatewayError::WithdrawalNotFound(withdrawal_id))?;
        if request.status != SettlementStatus::Pending {
            info!("💸️ Withdrawal #{withdrawal_id} is already {}; nothing to process.", request.status);
            return Ok(request);
        }
        let description = format!("{TRANSFER_DESCRIPTION_PREFIX}{withdrawal_id}");
        match self.transfers.initiate_transfer(request.amount, &request.payout_key, &description).await {
            Ok(()) => {
                info!("💸️ Transfer for withdrawal #{withdrawal_id} initiated. Awaiting provider authorisation.");
                Ok(request)
            },
            Err(e) => {
                error!("💸️ Transfer initiation for withdrawal #{withdrawal_id} failed: {e}");
                let note = format!("Transfer initiation failed: {e}");
                let failed = self.db.fail_withdrawal(withdrawal_id, &note).await?;
                match failed {
                    Some(request) => {
                        self.publish_settled(WithdrawalSettledEvent::failed(request.clone(), note)).await;
                        Ok(request)
                    },
                    // A settlement callback slipped in between; report the current state.
                    None => {
                        self.db
                            .fetch_withdrawal(withdrawal_id)
                            .await?
                            .ok_or(PaymentGatewayError::WithdrawalNotFound(withdrawal_id))
                    },
                }
            },
        }
    }

    /// The transfer provider approved the transfer: the blocked funds leave the platform for good. Only acts when
    /// the request is still `Pending` (the settlement idempotency guard); returns `None` otherwise.
    pub async fn transfer_approved(&self, withdrawal_id: i64) -> Result<Option<WithdrawalRequest>, PaymentGatewayError> {
        let settled = self.db.settle_withdrawal(withdrawal_id).await?;
        if let Some(request) = &settled {
            info!("💸️ Withdrawal #{withdrawal_id} settled: {} paid out to seller {}.", request.amount, request.seller_id);
            self.publish_settled(WithdrawalSettledEvent::settled(request.clone())).await;
        }
        Ok(settled)
    }

    /// The transfer provider refused or cancelled the transfer: full reversal, funds return to `available`. Only
    /// acts when the request is still `Pending`; returns `None` otherwise.
    pub async fn transfer_refused(
        &self,
        withdrawal_id: i64,
        reason: &str,
    ) -> Result<Option<WithdrawalRequest>, PaymentGatewayError> {
        let failed = self.db.fail_withdrawal(withdrawal_id, reason).await?;
        if let Some(request) = &failed {
            warn!("💸️ Withdrawal #{withdrawal_id} refused by provider: {reason}. Funds returned.");
            self.publish_settled(WithdrawalSettledEvent::failed(request.clone(), reason)).await;
        }
        Ok(failed)
    }

    /// Retries a failed withdrawal. The available balance is re-validated (it may have changed since the failure,
    /// e.g. a refund reduced it); on success the funds are re-blocked, the request returns to `Pending` and the
    /// transfer is initiated again.
    pub async fn retry_failed_withdrawal(&self, withdrawal_id: i64) -> Result<WithdrawalRequest, PaymentGatewayError> {
        let request = self.db.reopen_withdrawal(withdrawal_id).await?;
        info!("💸️ Withdrawal #{withdrawal_id} reopened; retrying transfer of {}.", request.amount);
        self.process_pending_withdrawal(withdrawal_id).await
    }

    async fn publish_settled(&self, event: WithdrawalSettledEvent) {
        for emitter in &self.producers.withdrawal_settled_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
