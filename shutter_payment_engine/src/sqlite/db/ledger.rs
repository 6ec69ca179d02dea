use sqlx::SqliteConnection;

use crate::{
    db_types::{Cents, LedgerEntry, OrderId, SettlementStatus},
    traits::PaymentGatewayError,
};

/// Appends a `Sale` ledger row for one order item's seller share.
pub async fn append_sale(
    seller_id: &str,
    order_id: &OrderId,
    amount: Cents,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query("INSERT INTO ledger_entries (seller_id, kind, amount, order_id, note) VALUES ($1, 'Sale', $2, $3, $4)")
        .bind(seller_id)
        .bind(amount)
        .bind(order_id.as_str())
        .bind(note)
        .execute(conn)
        .await?;
    Ok(())
}

/// Appends a `Refund` ledger row. `amount` must already be negative; only funds actually taken from the seller's
/// balance are recorded here, so the ledger always reconciles.
pub async fn append_refund(
    seller_id: &str,
    order_id: &OrderId,
    amount: Cents,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        "INSERT INTO ledger_entries (seller_id, kind, amount, order_id, note) VALUES ($1, 'Refund', $2, $3, $4)",
    )
    .bind(seller_id)
    .bind(amount)
    .bind(order_id.as_str())
    .bind(note)
    .execute(conn)
    .await?;
    Ok(())
}

/// Appends the `Withdrawal` ledger row for a new withdrawal request. The amount is stored negative with status
/// `Pending`; it participates in the reconciled balance only once the status reaches `Processed`.
pub async fn append_withdrawal(
    seller_id: &str,
    withdrawal_id: i64,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (seller_id, kind, amount, withdrawal_id, status, note)
        VALUES ($1, 'Withdrawal', $2, $3, 'Pending', 'Withdrawal requested')
        "#,
    )
    .bind(seller_id)
    .bind(-amount)
    .bind(withdrawal_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Updates the settlement status of the ledger rows linked to a withdrawal. This is the one permitted mutation of
/// ledger rows.
pub async fn update_withdrawal_status(
    withdrawal_id: i64,
    status: SettlementStatus,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query("UPDATE ledger_entries SET status = $2 WHERE withdrawal_id = $1 AND kind = 'Withdrawal'")
        .bind(withdrawal_id)
        .bind(status.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// The seller's full ledger history, newest first.
pub async fn history_for_seller(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let entries =
        sqlx::query_as("SELECT * FROM ledger_entries WHERE seller_id = $1 ORDER BY id DESC")
            .bind(seller_id)
            .fetch_all(conn)
            .await?;
    Ok(entries)
}

/// The reconciled ledger balance for a seller: sales plus refunds, plus withdrawals that have actually settled.
/// `Pending` withdrawals still sit in `blocked` and `Failed` ones were reversed, so neither counts.
pub async fn reconciled_balance(seller_id: &str, conn: &mut SqliteConnection) -> Result<Cents, sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
        WHERE seller_id = $1 AND (kind <> 'Withdrawal' OR status = 'Processed')
        "#,
    )
    .bind(seller_id)
    .fetch_one(conn)
    .await?;
    Ok(Cents::from(total))
}
