//! End-to-end tests of the order payment flow against a real SQLite database: exactly-once crediting, refund
//! reversal, and the ledger reconciliation invariant.
use shutter_payment_engine::{
    db,
    db_types::{LedgerEntryKind, OrderStatusType},
    events::EventProducers,
    pricing::{CartItem, CollectionPricing, VolumeTier},
    LedgerApi,
    LedgerManagement,
    OrderFlowApi,
    PaidOrderOutcome,
    PaymentGatewayDatabase,
    RefundOutcome,
    SqliteDatabase,
};
use spg_common::Cents;

mod support;

use support::{prepare_env::new_test_db, stubs::licensed_item};

const FEE_PERCENT: i64 = 20;

fn default_price() -> Cents {
    Cents::from(1_000)
}

fn order_flow(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), FEE_PERCENT, default_price(), EventProducers::default())
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
async fn paying_an_order_credits_each_seller_exactly_once() {
    let (db, _guard) = new_test_db().await;
    let api = order_flow(&db);
    let cart = vec![licensed_item("asset-1", "alice", 2_000), licensed_item("asset-2", "bob", 1_000)];
    let order = api.create_order("buyer-1", cart).await.unwrap();
    assert_eq!(order.total_price, Cents::from(3_000));
    assert_eq!(order.status, OrderStatusType::Pending);

    let outcome = api.payment_approved(&order.order_id, "pay-1").await.unwrap();
    let credits = match outcome {
        PaidOrderOutcome::Credited { credits, .. } => credits,
        other => panic!("expected first delivery to credit, got {other:?}"),
    };
    assert_eq!(credits.len(), 2);

    // Redelivery of the same webhook must not credit again.
    for _ in 0..3 {
        let outcome = api.payment_approved(&order.order_id, "pay-1").await.unwrap();
        assert!(matches!(outcome, PaidOrderOutcome::AlreadyProcessed { .. }));
    }

    // 20% platform fee: alice keeps 1600 of 2000, bob 800 of 1000.
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(1_600), Cents::from(0)));
    assert_eq!(ledger.balance("bob").await.unwrap(), (Cents::from(800), Cents::from(0)));
    for seller in ["alice", "bob"] {
        let sales: Vec<_> = ledger
            .history(seller)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.kind == LedgerEntryKind::Sale)
            .collect();
        assert_eq!(sales.len(), 1, "{seller} must have exactly one sale entry");
        assert_reconciled(&db, seller).await;
    }

    let paid = ledger.order(&order.order_id).await.unwrap().unwrap().0;
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(paid.external_payment_id.as_deref(), Some("pay-1"));

    // Sale counters were bumped inside the same transaction.
    let mut conn = db.pool().acquire().await.unwrap();
    assert_eq!(db::counters::sales_for("asset", "asset-1", &mut conn).await.unwrap(), 1);
    assert_eq!(db::counters::sales_for("asset", "asset-2", &mut conn).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_duplicate_deliveries_credit_exactly_once() {
    let (db, _guard) = new_test_db().await;
    let api = order_flow(&db);
    let order = api.create_order("buyer-1", vec![licensed_item("asset-1", "alice", 5_000)]).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let db = db.clone();
        let order_id = order.order_id.clone();
        tasks.push(tokio::spawn(async move { db.confirm_order_paid(&order_id, "pay-1", FEE_PERCENT).await }));
    }
    let mut credited = 0;
    let mut duplicates = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            PaidOrderOutcome::Credited { .. } => credited += 1,
            PaidOrderOutcome::AlreadyProcessed { .. } => duplicates += 1,
        }
    }
    assert_eq!(credited, 1, "exactly one concurrent delivery may win the conditional update");
    assert_eq!(duplicates, 7);

    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(4_000), Cents::from(0)));
    assert_eq!(ledger.history("alice").await.unwrap().len(), 1);
    assert_reconciled(&db, "alice").await;
}

#[tokio::test]
async fn rejected_payment_cancels_pending_orders_only() {
    let (db, _guard) = new_test_db().await;
    let api = order_flow(&db);
    let order = api.create_order("buyer-1", vec![licensed_item("asset-1", "alice", 1_000)]).await.unwrap();

    let cancelled = api.payment_rejected(&order.order_id).await.unwrap();
    assert!(cancelled.is_some());
    // Cancelling twice is a no-op, not an error.
    assert!(api.payment_rejected(&order.order_id).await.unwrap().is_none());

    // A paid order cannot be cancelled through the rejection path.
    let paid_order = api.create_order("buyer-2", vec![licensed_item("asset-2", "bob", 1_000)]).await.unwrap();
    api.payment_approved(&paid_order.order_id, "pay-2").await.unwrap();
    assert!(api.payment_rejected(&paid_order.order_id).await.unwrap().is_none());
    let ledger = LedgerApi::new(db.clone());
    let status = ledger.order(&paid_order.order_id).await.unwrap().unwrap().0.status;
    assert_eq!(status, OrderStatusType::Paid);
    assert_eq!(ledger.balance("bob").await.unwrap().0, Cents::from(800));
}

#[tokio::test]
async fn refund_reverses_credits_exactly_once() {
    let (db, _guard) = new_test_db().await;
    let api = order_flow(&db);
    let cart = vec![licensed_item("asset-1", "alice", 2_000), licensed_item("asset-2", "bob", 1_000)];
    let order = api.create_order("buyer-1", cart).await.unwrap();
    api.payment_approved(&order.order_id, "pay-1").await.unwrap();

    let outcome = api.payment_reversed(&order.order_id).await.unwrap();
    let reversals = match outcome {
        RefundOutcome::Reversed { reversals, .. } => reversals,
        other => panic!("expected the refund to reverse, got {other:?}"),
    };
    assert_eq!(reversals.len(), 2);
    assert!(reversals.iter().all(|r| r.shortfall == Cents::from(0)));

    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap().0, Cents::from(0));
    assert_eq!(ledger.balance("bob").await.unwrap().0, Cents::from(0));
    // The refund also closes the order.
    assert_eq!(ledger.order(&order.order_id).await.unwrap().unwrap().0.status, OrderStatusType::Cancelled);

    // Replaying the refund webhook must not double-decrement.
    let replay = api.payment_reversed(&order.order_id).await.unwrap();
    assert!(matches!(replay, RefundOutcome::NotReversible { .. }));
    assert_eq!(ledger.balance("alice").await.unwrap().0, Cents::from(0));
    let alice_refunds: Vec<_> = ledger
        .history("alice")
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == LedgerEntryKind::Refund)
        .collect();
    assert_eq!(alice_refunds.len(), 1);
    assert_eq!(alice_refunds[0].amount, Cents::from(-1_600));
    for seller in ["alice", "bob"] {
        assert_reconciled(&db, seller).await;
    }
}

#[tokio::test]
async fn refund_of_a_never_paid_order_is_a_no_op() {
    let (db, _guard) = new_test_db().await;
    let api = order_flow(&db);
    let order = api.create_order("buyer-1", vec![licensed_item("asset-1", "alice", 1_000)]).await.unwrap();
    let outcome = api.payment_reversed(&order.order_id).await.unwrap();
    assert!(matches!(outcome, RefundOutcome::NotReversible { .. }));
    assert!(LedgerApi::new(db.clone()).history("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn refund_clamps_at_zero_and_settles_shortfall_from_future_sales() {
    let (db, _guard) = new_test_db().await;
    let api = order_flow(&db);

    // Alice earns 800, then the funds leave the platform entirely (simulated settled withdrawal).
    let order = api.create_order("buyer-1", vec![licensed_item("asset-1", "alice", 1_000)]).await.unwrap();
    api.payment_approved(&order.order_id, "pay-1").await.unwrap();
    db.upsert_payout_key("alice", "alice-pix-key").await.unwrap();
    let withdrawal = db.create_withdrawal("alice", Cents::from(800), "alice-pix-key").await.unwrap();
    db.settle_withdrawal(withdrawal.id).await.unwrap();
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.balance("alice").await.unwrap(), (Cents::from(0), Cents::from(0)));

    // The refund cannot take what is no longer there: the balance clamps at zero and the 800 becomes a
    // receivable instead of a negative balance.
    let outcome = api.payment_reversed(&order.order_id).await.unwrap();
    let reversals = match outcome {
        RefundOutcome::Reversed { reversals, .. } => reversals,
        other => panic!("expected the refund to reverse, got {other:?}"),
    };
    assert_eq!(reversals[0].reversed, Cents::from(0));
    assert_eq!(reversals[0].shortfall, Cents::from(800));
    assert_eq!(ledger.balance("alice").await.unwrap().0, Cents::from(0));
    assert_eq!(ledger.audit("alice").await.unwrap().outstanding_refunds, Cents::from(800));
    assert_reconciled(&db, "alice").await;

    // Her next sale earns 800, which first settles the receivable: the balance stays at zero.
    let next = api.create_order("buyer-2", vec![licensed_item("asset-2", "alice", 1_000)]).await.unwrap();
    api.payment_approved(&next.order_id, "pay-2").await.unwrap();
    assert_eq!(ledger.balance("alice").await.unwrap().0, Cents::from(0));
    assert_eq!(ledger.audit("alice").await.unwrap().outstanding_refunds, Cents::from(0));
    assert_reconciled(&db, "alice").await;

    // With the receivable cleared, the sale after that credits normally.
    let third = api.create_order("buyer-3", vec![licensed_item("asset-3", "alice", 1_000)]).await.unwrap();
    api.payment_approved(&third.order_id, "pay-3").await.unwrap();
    assert_eq!(ledger.balance("alice").await.unwrap().0, Cents::from(800));
    assert_reconciled(&db, "alice").await;
}

#[tokio::test]
async fn volume_discounts_flow_through_to_frozen_item_prices() {
    let (db, _guard) = new_test_db().await;
    let api = order_flow(&db);
    let collection = CollectionPricing {
        collection_id: "wedding".to_string(),
        base_price: Some(Cents::from(1_500)),
        tiers: vec![
            VolumeTier { min_quantity: 3, price: Cents::from(800) },
            VolumeTier { min_quantity: 5, price: Cents::from(600) },
        ],
    };
    let item = |asset: &str| CartItem {
        asset_id: asset.to_string(),
        seller_id: "alice".to_string(),
        license_price: None,
        collection: Some(collection.clone()),
    };
    // Four same-collection items: the min:3 tier applies at 800 each.
    let cart = vec![item("a"), item("b"), item("c"), item("d")];
    let order = api.create_order("buyer-1", cart).await.unwrap();
    assert_eq!(order.total_price, Cents::from(3_200));

    let items = LedgerApi::new(db.clone()).order(&order.order_id).await.unwrap().unwrap().1;
    assert!(items.iter().all(|i| i.paid_price == Cents::from(800)));
    assert!(items.iter().all(|i| i.collection_id.as_deref() == Some("wedding")));

    // Collection counter is bumped once per item on payment.
    api.payment_approved(&order.order_id, "pay-1").await.unwrap();
    let mut conn = db.pool().acquire().await.unwrap();
    assert_eq!(db::counters::sales_for("collection", "wedding", &mut conn).await.unwrap(), 4);
}

#[tokio::test]
async fn creating_the_same_order_twice_is_idempotent() {
    let (db, _guard) = new_test_db().await;
    let order = shutter_payment_engine::db_types::NewOrder::new(
        "buyer-1".to_string(),
        vec![shutter_payment_engine::db_types::NewOrderItem {
            asset_id: "asset-1".to_string(),
            seller_id: "alice".to_string(),
            collection_id: None,
            paid_price: Cents::from(1_000),
        }],
    );
    let (first, inserted) = db.insert_order(order.clone()).await.unwrap();
    assert!(inserted);
    let (second, inserted) = db.insert_order(order).await.unwrap();
    assert!(!inserted);
    assert_eq!(first.id, second.id);
}
