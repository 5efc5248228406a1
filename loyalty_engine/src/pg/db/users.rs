use lgw_common::Points;
use log::*;
use sqlx::PgConnection;

use crate::{
    db_types::{Balance, User},
    pg::db::is_unique_violation,
    traits::StorageError,
};

pub async fn insert_user(login: &str, password_hash: &str, conn: &mut PgConnection) -> Result<i64, StorageError> {
    let id: i64 = sqlx::query_scalar("INSERT INTO users (login, password) VALUES ($1, $2) RETURNING id")
        .bind(login)
        .bind(password_hash)
        .fetch_one(conn)
        .await
        .map_err(|e| if is_unique_violation(&e) { StorageError::UserAlreadyExists } else { e.into() })?;
    debug!("🗃️ Created user #{id}");
    Ok(id)
}

pub async fn fetch_user_by_login(login: &str, conn: &mut PgConnection) -> Result<Option<User>, StorageError> {
    let user = sqlx::query_as("SELECT id, login, password, current, withdrawn FROM users WHERE login = $1")
        .bind(login)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

pub async fn user_exists(user_id: i64, conn: &mut PgConnection) -> Result<bool, StorageError> {
    let id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(id.is_some())
}

pub async fn fetch_balance(user_id: i64, conn: &mut PgConnection) -> Result<Option<Balance>, StorageError> {
    let balance = sqlx::query_as("SELECT current, withdrawn FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(balance)
}

/// Adds `amount` to the user's spendable points. Call inside the transaction that records the reason for the
/// credit.
pub async fn credit_points(user_id: i64, amount: Points, conn: &mut PgConnection) -> Result<(), StorageError> {
    let result = sqlx::query("UPDATE users SET current = current + $1 WHERE id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(conn)
        .await?;
    if result.rows_affected() != 1 {
        return Err(StorageError::UserNotFound);
    }
    trace!("🗃️ Credited {amount} points to user #{user_id}");
    Ok(())
}

/// Moves `sum` points from `current` to `withdrawn`, but only when the account can cover it. The `current >= $1`
/// predicate makes the insufficient-funds check and the debit one atomic statement.
pub async fn debit_for_withdrawal(user_id: i64, sum: Points, conn: &mut PgConnection) -> Result<(), StorageError> {
    let result =
        sqlx::query("UPDATE users SET current = current - $1, withdrawn = withdrawn + $1 WHERE id = $2 AND current >= $1")
            .bind(sum)
            .bind(user_id)
            .execute(conn)
            .await?;
    if result.rows_affected() != 1 {
        return Err(StorageError::InsufficientFunds);
    }
    trace!("🗃️ Withdrew {sum} points from user #{user_id}");
    Ok(())
}
