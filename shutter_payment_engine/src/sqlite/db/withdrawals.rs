use sqlx::SqliteConnection;

use crate::{
    db_types::{Cents, WithdrawalRequest},
    traits::PaymentGatewayError,
};

pub async fn insert_request(
    seller_id: &str,
    amount: Cents,
    payout_key: &str,
    conn: &mut SqliteConnection,
) -> Result<WithdrawalRequest, PaymentGatewayError> {
    let request = sqlx::query_as(
        r#"
        INSERT INTO withdrawal_requests (seller_id, amount, payout_key)
        VALUES ($1, $2, $3)
        RETURNING *;
        "#,
    )
    .bind(seller_id)
    .bind(amount)
    .bind(payout_key)
    .fetch_one(conn)
    .await?;
    Ok(request)
}

pub async fn fetch_request(
    withdrawal_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
    let request = sqlx::query_as("SELECT * FROM withdrawal_requests WHERE id = $1")
        .bind(withdrawal_id)
        .fetch_optional(conn)
        .await?;
    Ok(request)
}

pub async fn fetch_requests_for_seller(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<WithdrawalRequest>, sqlx::Error> {
    let requests = sqlx::query_as("SELECT * FROM withdrawal_requests WHERE seller_id = $1 ORDER BY id DESC")
        .bind(seller_id)
        .fetch_all(conn)
        .await?;
    Ok(requests)
}

/// Conditional `Pending -> Processed`. The affected-row count is the settlement idempotency guard: the provider
/// may deliver its authorisation callback more than once.
pub async fn mark_processed_if_pending(
    withdrawal_id: i64,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
        UPDATE withdrawal_requests
        SET status = 'Processed', note = $2, processed_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status = 'Pending'
        "#,
    )
    .bind(withdrawal_id)
    .bind(note)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Conditional `Pending -> Failed`.
pub async fn mark_failed_if_pending(
    withdrawal_id: i64,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
        UPDATE withdrawal_requests
        SET status = 'Failed', note = $2, processed_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status = 'Pending'
        "#,
    )
    .bind(withdrawal_id)
    .bind(note)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Conditional `Failed -> Pending` for a retry. Clears the failure note and settlement timestamp.
pub async fn reopen_if_failed(withdrawal_id: i64, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
        UPDATE withdrawal_requests
        SET status = 'Pending', note = NULL, processed_at = NULL
        WHERE id = $1 AND status = 'Failed'
        "#,
    )
    .bind(withdrawal_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
