//! Withdrawal state-machine tests against a real SQLite database: the available/blocked round trips, full
//! reversal on failure, retry re-validation, and settlement idempotency.
use shutter_payment_engine::{
    db_types::{LedgerEntryKind, SettlementStatus},
    events::EventProducers,
    LedgerApi,
    LedgerManagement,
    OrderFlowApi,
    PaymentGatewayError,
    PayoutApi,
    SqliteDatabase,
};
use spg_common::Cents;

mod support;

use support::{
    prepare_env::new_test_db,
    stubs::{licensed_item, StubTransfers},
};

const FEE_PERCENT: i64 = 20;

fn min_withdrawal() -> Cents {
    Cents::from(2_000)
}

fn payouts(db: &SqliteDatabase, transfers: StubTransfers) -> PayoutApi<SqliteDatabase, StubTransfers> {
    PayoutApi::new(db.clone(), transfers, min_withdrawal(), EventProducers::default())
}

/// Gives the seller an available balance by selling one asset. Returns the credited amount.
async fn seed_balance(db: &SqliteDatabase, seller_id: &str, gross_cents: i64) -> Cents {
    let api = OrderFlowApi::new(db.clone(), FEE_PERCENT, Cents::from(1_000), EventProducers::default());
    let order = api
        .create_order("buyer-1", vec![licensed_item(&format!("asset-{seller_id}"), seller_id, gross_cents)])
        .await
        .unwrap();
    api.payment_approved(&order.order_id, &format!("pay-{}", order.order_id)).await.unwrap();
    Cents::from(gross_cents).seller_share(FEE_PERCENT)
}

async fn assert_reconciled(db: &SqliteDatabase, seller_id: &str) {
    let audit = LedgerApi::new(db.clone()).audit(seller_id).await.unwrap();
    assert!(
        audit.consistent,
        "ledger for {seller_id} does not reconcile: available {} + blocked {} != ledger {}",
        audit.available, audit.blocked, audit.ledger_total
    );
}

#[tokio::test]
async fn withdrawal_roundtrip_success() {
    let (db, _guard) = new_test_db().await;
    let credited = seed_balance(&db, "alice", 10_000).await;
    assert_eq!(credited, Cents::from(8_000));
    db.upsert_payout_key("alice", "alice-pix-key").await.unwrap();

    let transfers = StubTransfers::default();
    let api = payouts(&db, transfers.clone());
    let request = api.request_and_process("alice", Cents::from(5_000)).await.unwrap();
    assert_eq!(request.status, SettlementStatus::Pending);
    assert_eq!(transfers.calls(), 1);

    // Requesting moved the funds available -> blocked.
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(3_000), Cents::from(5_000)));
    assert_reconciled(&db, "alice").await;

    // Provider authorisation settles the withdrawal: blocked funds leave, available is untouched.
    let settled = api.transfer_approved(request.id).await.unwrap().unwrap();
    assert_eq!(settled.status, SettlementStatus::Processed);
    assert!(settled.processed_at.is_some());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(3_000), Cents::from(0)));
    assert_reconciled(&db, "alice").await;

    let entry = ledger
        .history("alice")
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.kind == LedgerEntryKind::Withdrawal)
        .unwrap();
    assert_eq!(entry.amount, Cents::from(-5_000));
    assert_eq!(entry.status, Some(SettlementStatus::Processed));

    // The provider may deliver the authorisation callback twice; the second is a no-op.
    assert!(api.transfer_approved(request.id).await.unwrap().is_none());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(3_000), Cents::from(0)));
}

#[tokio::test]
async fn withdrawal_request_validations() {
    let (db, _guard) = new_test_db().await;
    seed_balance(&db, "alice", 10_000).await;

    let api = payouts(&db, StubTransfers::default());
    // Below the platform minimum.
    let err = api.request_withdrawal("alice", Cents::from(500)).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::BelowMinimumWithdrawal { .. }));
    // No payout key on file.
    let err = api.request_withdrawal("alice", Cents::from(2_000)).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::NoPayoutKey(_)));
    // More than the available balance. The balance is untouched afterwards.
    db.upsert_payout_key("alice", "alice-pix-key").await.unwrap();
    let err = api.request_withdrawal("alice", Cents::from(9_000)).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::InsufficientFunds(_)));
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(8_000), Cents::from(0)));
    assert!(ledger.withdrawals("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn initiation_failure_reverses_fully() {
    let (db, _guard) = new_test_db().await;
    seed_balance(&db, "alice", 10_000).await;
    db.upsert_payout_key("alice", "alice-pix-key").await.unwrap();

    let api = payouts(&db, StubTransfers::failing("pix key rejected"));
    let request = api.request_and_process("alice", Cents::from(5_000)).await.unwrap();
    assert_eq!(request.status, SettlementStatus::Failed);
    assert!(request.note.as_deref().unwrap_or("").contains("pix key rejected"));

    // Net zero: the blocked funds went straight back to available.
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(8_000), Cents::from(0)));
    let entry = ledger
        .history("alice")
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.kind == LedgerEntryKind::Withdrawal)
        .unwrap();
    assert_eq!(entry.status, Some(SettlementStatus::Failed));
    assert_reconciled(&db, "alice").await;
}

#[tokio::test]
async fn transfer_refusal_reverses_and_is_idempotent() {
    let (db, _guard) = new_test_db().await;
    seed_balance(&db, "alice", 10_000).await;
    db.upsert_payout_key("alice", "alice-pix-key").await.unwrap();

    let api = payouts(&db, StubTransfers::default());
    let request = api.request_and_process("alice", Cents::from(5_000)).await.unwrap();
    assert_eq!(request.status, SettlementStatus::Pending);

    let failed = api.transfer_refused(request.id, "provider refused authorisation").await.unwrap().unwrap();
    assert_eq!(failed.status, SettlementStatus::Failed);
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(8_000), Cents::from(0)));
    assert_reconciled(&db, "alice").await;

    // A duplicate refusal callback has nothing left to reverse.
    assert!(api.transfer_refused(request.id, "again").await.unwrap().is_none());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(8_000), Cents::from(0)));

    // And a late approval callback cannot resurrect a failed withdrawal.
    assert!(api.transfer_approved(request.id).await.unwrap().is_none());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(8_000), Cents::from(0)));
}

#[tokio::test]
async fn retry_revalidates_funds_before_reblocking() {
    let (db, _guard) = new_test_db().await;
    let order_api = OrderFlowApi::new(db.clone(), FEE_PERCENT, Cents::from(1_000), EventProducers::default());
    let order = order_api.create_order("buyer-1", vec![licensed_item("asset-1", "alice", 10_000)]).await.unwrap();
    order_api.payment_approved(&order.order_id, "pay-1").await.unwrap();
    db.upsert_payout_key("alice", "alice-pix-key").await.unwrap();

    let api = payouts(&db, StubTransfers::failing("temporary outage"));
    let request = api.request_and_process("alice", Cents::from(5_000)).await.unwrap();
    assert_eq!(request.status, SettlementStatus::Failed);

    // A refund lands between the failure and the retry, draining the balance.
    order_api.payment_reversed(&order.order_id).await.unwrap();
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(0), Cents::from(0)));

    // The retry must re-check the funds rather than blindly re-blocking.
    let err = api.retry_failed_withdrawal(request.id).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::InsufficientFundsForRetry(_)));
    let unchanged = db.fetch_withdrawal(request.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, SettlementStatus::Failed);
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(0), Cents::from(0)));
    assert_reconciled(&db, "alice").await;
}

#[tokio::test]
async fn retry_reblocks_funds_and_reinitiates_the_transfer() {
    let (db, _guard) = new_test_db().await;
    seed_balance(&db, "alice", 10_000).await;
    db.upsert_payout_key("alice", "alice-pix-key").await.unwrap();

    // First attempt fails at the provider.
    let failing = payouts(&db, StubTransfers::failing("temporary outage"));
    let request = failing.request_and_process("alice", Cents::from(5_000)).await.unwrap();
    assert_eq!(request.status, SettlementStatus::Failed);
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(8_000), Cents::from(0)));

    // The retry re-blocks the funds and initiates a fresh transfer.
    let transfers = StubTransfers::default();
    let api = payouts(&db, transfers.clone());
    let retried = api.retry_failed_withdrawal(request.id).await.unwrap();
    assert_eq!(retried.status, SettlementStatus::Pending);
    assert_eq!(transfers.calls(), 1);
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(3_000), Cents::from(5_000)));
    assert_reconciled(&db, "alice").await;

    // Only Failed withdrawals can be retried.
    let err = api.retry_failed_withdrawal(request.id).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::WithdrawalNotRetryable(_)));

    // Settlement completes the round trip.
    let settled = api.transfer_approved(request.id).await.unwrap().unwrap();
    assert_eq!(settled.status, SettlementStatus::Processed);
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(3_000), Cents::from(0)));
    assert_reconciled(&db, "alice").await;
}

#[tokio::test]
async fn withdrawal_and_refund_racing_on_the_same_balance_stay_consistent() {
    let (db, _guard) = new_test_db().await;
    let order_api = OrderFlowApi::new(db.clone(), FEE_PERCENT, Cents::from(1_000), EventProducers::default());
    let order = order_api.create_order("buyer-1", vec![licensed_item("asset-1", "alice", 10_000)]).await.unwrap();
    order_api.payment_approved(&order.order_id, "pay-1").await.unwrap();
    db.upsert_payout_key("alice", "alice-pix-key").await.unwrap();

    // Fire the withdrawal request and the refund concurrently. Both mutate the same balance row; whatever
    // interleaving wins, nothing may be double-spent and the ledger must still reconcile.
    let withdraw_db = db.clone();
    let withdraw = tokio::spawn(async move {
        let api = PayoutApi::new(
            withdraw_db.clone(),
            StubTransfers::default(),
            Cents::from(2_000),
            EventProducers::default(),
        );
        api.request_withdrawal("alice", Cents::from(8_000)).await
    });
    let refund_db = db.clone();
    let order_id = order.order_id.clone();
    let refund = tokio::spawn(async move {
        let api = OrderFlowApi::new(refund_db, FEE_PERCENT, Cents::from(1_000), EventProducers::default());
        api.payment_reversed(&order_id).await
    });
    let withdraw_result = withdraw.await.unwrap();
    let refund_result = refund.await.unwrap();
    assert!(refund_result.is_ok());

    let ledger = LedgerApi::new(db.clone());
    let (available, blocked) = ledger.balance("alice").await.unwrap();
    match withdraw_result {
        // The withdrawal won the race: the refund found nothing available and recorded a shortfall.
        Ok(request) => {
            assert_eq!(blocked, Cents::from(8_000));
            assert_eq!(available, Cents::from(0));
            assert_eq!(request.status, SettlementStatus::Pending);
        },
        // The refund won: the withdrawal was refused for insufficient funds.
        Err(e) => {
            assert!(matches!(e, PaymentGatewayError::InsufficientFunds(_)));
            assert_eq!(available, Cents::from(0));
            assert_eq!(blocked, Cents::from(0));
        },
    }
    assert_reconciled(&db, "alice").await;
}
