use sqlx::SqliteConnection;

use crate::traits::PaymentGatewayError;

pub async fn fetch_payout_key(seller_id: &str, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let key: Option<Option<String>> = sqlx::query_scalar("SELECT payout_key FROM sellers WHERE seller_id = $1")
        .bind(seller_id)
        .fetch_optional(conn)
        .await?;
    Ok(key.flatten())
}

pub async fn upsert_payout_key(
    seller_id: &str,
    payout_key: &str,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
        INSERT INTO sellers (seller_id, payout_key) VALUES ($1, $2)
        ON CONFLICT (seller_id) DO UPDATE SET payout_key = excluded.payout_key, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(seller_id)
    .bind(payout_key)
    .execute(conn)
    .await?;
    Ok(())
}
