use sqlx::SqliteConnection;

use crate::{db_types::Cents, traits::PaymentGatewayError};

/// Records refund value that could not be taken from the seller's available balance (they had already withdrawn
/// the proceeds). Settled out of future sale credits by [`settle_up_to`].
pub async fn record(
    seller_id: &str,
    order_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query("INSERT INTO refund_shortfalls (seller_id, order_id, outstanding) VALUES ($1, $2, $3)")
        .bind(seller_id)
        .bind(order_id)
        .bind(amount)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn outstanding_for_seller(seller_id: &str, conn: &mut SqliteConnection) -> Result<Cents, sqlx::Error> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(outstanding), 0) FROM refund_shortfalls WHERE seller_id = $1")
            .bind(seller_id)
            .fetch_one(conn)
            .await?;
    Ok(Cents::from(total))
}

/// Settles up to `limit` of the seller's outstanding shortfalls, oldest first. Returns the settled portions keyed
/// by the order the shortfall came from, so callers can append matching ledger rows. Rows that reach zero are
/// deleted so the table only holds live receivables.
pub async fn settle_up_to(
    seller_id: &str,
    limit: Cents,
    conn: &mut SqliteConnection,
) -> Result<Vec<(String, Cents)>, PaymentGatewayError> {
    let mut remaining = limit;
    let mut settlements = Vec::new();
    let rows: Vec<(i64, String, Cents)> = sqlx::query_as(
        "SELECT id, order_id, outstanding FROM refund_shortfalls WHERE seller_id = $1 AND outstanding > 0 ORDER BY \
         id ASC",
    )
    .bind(seller_id)
    .fetch_all(&mut *conn)
    .await?;
    for (id, order_id, outstanding) in rows {
        if !remaining.is_positive() {
            break;
        }
        let take = outstanding.min(remaining);
        if take == outstanding {
            sqlx::query("DELETE FROM refund_shortfalls WHERE id = $1").bind(id).execute(&mut *conn).await?;
        } else {
            sqlx::query(
                "UPDATE refund_shortfalls SET outstanding = outstanding - $2, updated_at = CURRENT_TIMESTAMP WHERE \
                 id = $1",
            )
            .bind(id)
            .bind(take)
            .execute(&mut *conn)
            .await?;
        }
        settlements.push((order_id, take));
        remaining -= take;
    }
    Ok(settlements)
}
