use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem},
    traits::PaymentGatewayError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order and its items using the given connection. This is not atomic on its own; embed the call
/// inside a transaction and pass `&mut *tx` as the connection argument.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    let inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, buyer_id, total_price)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.buyer_id)
    .bind(order.total_price)
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, asset_id, seller_id, collection_id, paid_price)
            VALUES ($1, $2, $3, $4, $5);
        "#,
        )
        .bind(&order.order_id)
        .bind(&item.asset_id)
        .bind(&item.seller_id)
        .bind(&item.collection_id)
        .bind(item.paid_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(inserted)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_items_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// The conditional update at the heart of webhook idempotency. Flips the order to `Paid` and records the external
/// payment id only when the order is not already `Paid`; the affected-row count tells the caller whether this call
/// was the first to process the payment.
pub async fn mark_paid_if_unpaid(
    order_id: &OrderId,
    external_payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'Paid', external_payment_id = $2, updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status <> 'Paid'
        "#,
    )
    .bind(order_id.as_str())
    .bind(external_payment_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Conditional `Pending -> Cancelled`. The affected-row count distinguishes a real cancellation from a repeat.
pub async fn cancel_if_pending(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'Cancelled', updated_at = CURRENT_TIMESTAMP WHERE order_id = $1 AND status = \
         'Pending'",
    )
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Conditional `Paid -> Cancelled`, the refund idempotency oracle. Exactly one refund webhook delivery can observe
/// `true` here; replays and refunds of never-paid orders observe `false`.
pub async fn cancel_if_paid(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'Cancelled', updated_at = CURRENT_TIMESTAMP WHERE order_id = $1 AND status = \
         'Paid'",
    )
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
