use sqlx::SqliteConnection;

use crate::{
    db_types::{Cents, SellerBalance},
    traits::PaymentGatewayError,
};

pub async fn fetch_balance(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerBalance>, sqlx::Error> {
    let balance = sqlx::query_as("SELECT * FROM seller_balances WHERE seller_id = $1")
        .bind(seller_id)
        .fetch_optional(conn)
        .await?;
    Ok(balance)
}

/// Credits the seller's available balance, creating the balance row on first credit.
pub async fn credit_available(
    seller_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
        INSERT INTO seller_balances (seller_id, available, blocked) VALUES ($1, $2, 0)
        ON CONFLICT (seller_id)
        DO UPDATE SET available = available + excluded.available, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(seller_id)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(())
}

/// Debits the seller's available balance. The conditional `available >= amount` makes the debit refuse rather than
/// go negative; callers decide how to treat a `false` result.
pub async fn debit_available_if_sufficient(
    seller_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
        UPDATE seller_balances
        SET available = available - $2, updated_at = CURRENT_TIMESTAMP
        WHERE seller_id = $1 AND available >= $2
        "#,
    )
    .bind(seller_id)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Moves funds from `available` to `blocked` for a new or retried withdrawal. The `available >= amount` condition
/// is the sufficient-funds oracle: a zero row count means the seller cannot cover the withdrawal and nothing moved.
pub async fn block_if_sufficient(
    seller_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
        UPDATE seller_balances
        SET available = available - $2, blocked = blocked + $2, updated_at = CURRENT_TIMESTAMP
        WHERE seller_id = $1 AND available >= $2
        "#,
    )
    .bind(seller_id)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns blocked funds to `available` after a failed or refused transfer.
pub async fn unblock(seller_id: &str, amount: Cents, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
        UPDATE seller_balances
        SET available = available + $2, blocked = blocked - $2, updated_at = CURRENT_TIMESTAMP
        WHERE seller_id = $1
        "#,
    )
    .bind(seller_id)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(())
}

/// Removes settled withdrawal funds from `blocked`. The money is at the seller's bank now; there is no
/// corresponding credit anywhere in the ledger.
pub async fn release_blocked(
    seller_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
        UPDATE seller_balances
        SET blocked = blocked - $2, updated_at = CURRENT_TIMESTAMP
        WHERE seller_id = $1
        "#,
    )
    .bind(seller_id)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(())
}
