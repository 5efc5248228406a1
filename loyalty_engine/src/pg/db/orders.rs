use log::*;
use sqlx::PgConnection;

use crate::{
    db_types::{Order, OrderNumber, OrderStatus},
    pg::db::is_unique_violation,
    traits::StorageError,
};

pub async fn insert_order(order: &Order, conn: &mut PgConnection) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO orders (number, user_id, status, accrual, uploaded_at) VALUES ($1, $2, $3, $4, $5)")
        .bind(&order.number)
        .bind(order.user_id)
        .bind(order.status.to_string())
        .bind(order.accrual)
        .bind(order.uploaded_at)
        .execute(conn)
        .await
        .map_err(|e| if is_unique_violation(&e) { StorageError::OrderAlreadyExists } else { e.into() })?;
    debug!("🗃️ Order [{}] inserted for user #{}", order.number, order.user_id);
    Ok(())
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut PgConnection,
) -> Result<Option<Order>, StorageError> {
    let order = sqlx::query_as("SELECT number, user_id, status, accrual, uploaded_at FROM orders WHERE number = $1")
        .bind(number)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// All orders uploaded by the given user, newest first.
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut PgConnection) -> Result<Vec<Order>, StorageError> {
    let orders = sqlx::query_as(
        "SELECT number, user_id, status, accrual, uploaded_at FROM orders WHERE user_id = $1 ORDER BY uploaded_at \
         DESC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_orders_by_status(
    statuses: &[OrderStatus],
    conn: &mut PgConnection,
) -> Result<Vec<Order>, StorageError> {
    let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>();
    let orders = sqlx::query_as(
        "SELECT number, user_id, status, accrual, uploaded_at FROM orders WHERE status = ANY($1)",
    )
    .bind(&statuses)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Writes one reconciled order state, keyed by number. Terminal rows are left untouched (`false` is returned), so
/// a replayed transition can never regress a finished order or double-credit its accrual.
pub async fn update_order(order: &Order, conn: &mut PgConnection) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "UPDATE orders SET user_id = $1, status = $2, accrual = $3, uploaded_at = $4 WHERE number = $5 AND status \
         NOT IN ('INVALID', 'PROCESSED')",
    )
    .bind(order.user_id)
    .bind(order.status.to_string())
    .bind(order.accrual)
    .bind(order.uploaded_at)
    .bind(&order.number)
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    if updated {
        trace!("🗃️ Order [{}] is now {}", order.number, order.status);
    } else {
        debug!("🗃️ Order [{}] was not updated (missing or already terminal)", order.number);
    }
    Ok(updated)
}
