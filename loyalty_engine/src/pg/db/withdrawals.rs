use log::*;
use sqlx::PgConnection;

use crate::{
    db_types::Withdrawal,
    pg::db::is_unique_violation,
    traits::StorageError,
};

pub async fn insert_withdrawal(withdrawal: &Withdrawal, conn: &mut PgConnection) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO withdrawals (user_id, order_number, sum, processed_at) VALUES ($1, $2, $3, $4)")
        .bind(withdrawal.user_id)
        .bind(&withdrawal.order_number)
        .bind(withdrawal.sum)
        .bind(withdrawal.processed_at)
        .execute(conn)
        .await
        .map_err(|e| if is_unique_violation(&e) { StorageError::WithdrawalAlreadyExists } else { e.into() })?;
    debug!("🗃️ Withdrawal of {} recorded against order [{}]", withdrawal.sum, withdrawal.order_number);
    Ok(())
}

/// All withdrawals recorded by the given user, newest first.
pub async fn fetch_withdrawals_for_user(
    user_id: i64,
    conn: &mut PgConnection,
) -> Result<Vec<Withdrawal>, StorageError> {
    let withdrawals = sqlx::query_as(
        "SELECT user_id, order_number, sum, processed_at FROM withdrawals WHERE user_id = $1 ORDER BY processed_at \
         DESC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(withdrawals)
}
