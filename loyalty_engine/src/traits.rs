//! The storage contract for the loyalty gateway.
//!
//! A [`LoyaltyStore`] is the single logical repository the rest of the engine talks to. Every mutating operation
//! that touches more than one row runs inside one database transaction; callers never hold locks of their own.

use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::{Balance, Order, OrderNumber, OrderStatus, User, Withdrawal};

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("A user with this login already exists")]
    UserAlreadyExists,
    #[error("The user does not exist")]
    UserNotFound,
    #[error("The supplied password does not match the stored credentials")]
    BadPassword,
    #[error("The order was already uploaded")]
    OrderAlreadyExists,
    #[error("The order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("No orders were found")]
    OrdersNotFound,
    #[error("A withdrawal against this order number already exists")]
    WithdrawalAlreadyExists,
    #[error("No withdrawals were found")]
    WithdrawalNotFound,
    #[error("The account does not hold enough points to cover the withdrawal")]
    InsufficientFunds,
    #[error("Could not prepare a database statement: {0}")]
    StatementError(String),
    #[error("Database execution error: {0}")]
    ExecutionError(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StorageError::ExecutionError("unexpected empty result set".to_string()),
            e => StorageError::ExecutionError(e.to_string()),
        }
    }
}

/// The transactional repository backing the gateway.
#[async_trait]
pub trait LoyaltyStore: Clone + Send + Sync {
    /// Creates a new user and returns its id. Fails with [`StorageError::UserAlreadyExists`] when the login is
    /// taken.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, StorageError>;

    /// Fetches the user matching `login` and verifies `password_hash` against the stored hash.
    ///
    /// [`StorageError::UserNotFound`] and [`StorageError::BadPassword`] are distinguished here for diagnostics;
    /// callers present them identically to clients.
    async fn user_by_credentials(&self, login: &str, password_hash: &str) -> Result<User, StorageError>;

    /// Atomically inserts `order` for an existing user. When the order arrives already `PROCESSED`, its accrual is
    /// credited to the owner in the same transaction.
    async fn add_order(&self, order: &Order) -> Result<(), StorageError>;

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Order, StorageError>;

    /// All orders uploaded by `user_id`, newest first. An empty result is [`StorageError::OrdersNotFound`].
    async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StorageError>;

    /// Orders in any of the given statuses. Used at bootstrap to rehydrate the updater.
    async fn orders_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StorageError>;

    /// Applies a batch of status transitions as one transaction. Entries that move an order to `PROCESSED` also
    /// credit the accrual to the owner's balance. Partial application is impossible: either the whole batch
    /// commits or none of it does.
    async fn update_orders(&self, batch: &[Order]) -> Result<(), StorageError>;

    /// Atomically records `withdrawal` and moves `sum` points from the owner's `current` to `withdrawn`. Refuses
    /// to commit when the debit would push `current` below zero.
    async fn add_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StorageError>;

    async fn user_balance(&self, user_id: i64) -> Result<Balance, StorageError>;

    /// All withdrawals recorded for `user_id`, newest first. An empty result is
    /// [`StorageError::WithdrawalNotFound`].
    async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, StorageError>;
}
