use sqlx::SqliteConnection;

use crate::traits::PaymentGatewayError;

/// Sale counters for assets and collections, bumped inside the same transaction that credits the sale. The storefront
/// reads these for popularity ranking.
pub async fn increment(scope: &str, scope_id: &str, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
        INSERT INTO sale_counters (scope, scope_id, sales) VALUES ($1, $2, 1)
        ON CONFLICT (scope, scope_id) DO UPDATE SET sales = sales + 1
        "#,
    )
    .bind(scope)
    .bind(scope_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn sales_for(scope: &str, scope_id: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let sales: Option<i64> = sqlx::query_scalar("SELECT sales FROM sale_counters WHERE scope = $1 AND scope_id = $2")
        .bind(scope)
        .bind(scope_id)
        .fetch_optional(conn)
        .await?;
    Ok(sales.unwrap_or(0))
}
