use std::fmt::Debug;

use async_trait::async_trait;
use log::*;
use sqlx::PgPool;

use super::db::{new_pool, orders, run_migrations, users, withdrawals};
use crate::{
    db_types::{Balance, Order, OrderNumber, OrderStatus, User, Withdrawal},
    helpers::hasher::hashes_match,
    traits::{LoyaltyStore, StorageError},
};

#[derive(Clone)]
pub struct PgDatabase {
    url: String,
    pool: PgPool,
}

impl Debug for PgDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PgDatabase ({:?})", self.pool)
    }
}

impl PgDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        run_migrations(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl LoyaltyStore for PgDatabase {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(login, password_hash, &mut conn).await
    }

    async fn user_by_credentials(&self, login: &str, password_hash: &str) -> Result<User, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_login(login, &mut conn).await?.ok_or(StorageError::UserNotFound)?;
        if !hashes_match(&user.password_hash, password_hash) {
            return Err(StorageError::BadPassword);
        }
        Ok(user)
    }

    async fn add_order(&self, order: &Order) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        if !users::user_exists(order.user_id, &mut tx).await? {
            return Err(StorageError::UserNotFound);
        }
        orders::insert_order(order, &mut tx).await?;
        // An order that arrives already settled credits its owner in the same transaction.
        if order.status == OrderStatus::Processed {
            users::credit_points(order.user_id, order.accrual, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_number(number, &mut conn)
            .await?
            .ok_or_else(|| StorageError::OrderNotFound(number.clone()))
    }

    async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        if orders.is_empty() {
            return Err(StorageError::OrdersNotFound);
        }
        Ok(orders)
    }

    async fn orders_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_by_status(statuses, &mut conn).await
    }

    async fn update_orders(&self, batch: &[Order]) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for order in batch {
            let updated = orders::update_order(order, &mut tx).await?;
            // The guard in `update_order` skips rows that are already terminal, so the credit below runs at most
            // once per order even when a transition is replayed.
            if updated && order.status == OrderStatus::Processed {
                users::credit_points(order.user_id, order.accrual, &mut tx).await?;
            }
        }
        tx.commit().await?;
        debug!("🗃️ Applied a batch of {} order updates", batch.len());
        Ok(())
    }

    async fn add_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        withdrawals::insert_withdrawal(withdrawal, &mut tx).await?;
        users::debit_for_withdrawal(withdrawal.user_id, withdrawal.sum, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn user_balance(&self, user_id: i64) -> Result<Balance, StorageError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_balance(user_id, &mut conn).await?.ok_or(StorageError::UserNotFound)
    }

    async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let withdrawals = withdrawals::fetch_withdrawals_for_user(user_id, &mut conn).await?;
        if withdrawals.is_empty() {
            return Err(StorageError::WithdrawalNotFound);
        }
        Ok(withdrawals)
    }
}
