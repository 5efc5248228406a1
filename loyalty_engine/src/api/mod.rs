//! Application-level operations invoked by request handlers.
//!
//! [`UserApi`] is a thin orchestration layer over a [`LoyaltyStore`] and the password hasher: it validates input,
//! decides which storage operations run, and translates storage failures into caller-facing error kinds. It holds
//! no state of its own.

use chrono::Utc;
use lgw_common::{luhn, Points};
use log::*;
use thiserror::Error;

use crate::{
    db_types::{Balance, Order, OrderNumber, User, Withdrawal},
    helpers::{hasher::HasherError, PasswordHasher},
    traits::{LoyaltyStore, StorageError},
};

#[derive(Debug, Clone, Error)]
pub enum UserApiError {
    #[error("The login or password is incorrect")]
    InvalidCredentials,
    #[error("This order was already uploaded by you")]
    RepeatedOrderRequest,
    #[error("This order was already uploaded by another user")]
    ForeignOrder,
    #[error("The order number failed checksum validation")]
    InvalidOrderNumber,
    #[error("The withdrawal sum must be positive")]
    InvalidWithdrawalSum,
    #[error("Not enough points to cover the withdrawal")]
    InsufficientFunds,
    #[error("{0}")]
    HasherError(#[from] HasherError),
    #[error("{0}")]
    StorageError(#[from] StorageError),
}

#[derive(Clone)]
pub struct UserApi<B> {
    store: B,
    hasher: PasswordHasher,
}

impl<B: LoyaltyStore> UserApi<B> {
    pub fn new(store: B, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// Registers a new user and returns its id.
    pub async fn sign_up(&self, login: &str, password: &str) -> Result<i64, UserApiError> {
        let password_hash = self.hasher.hash(password)?;
        let id = self.store.create_user(login, &password_hash).await?;
        info!("🧑️ New user #{id} registered");
        Ok(id)
    }

    /// Authenticates a user by login and password. A missing user and a wrong password are deliberately collapsed
    /// into one error so that callers cannot probe for registered logins.
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<User, UserApiError> {
        let password_hash = self.hasher.hash(password)?;
        match self.store.user_by_credentials(login, &password_hash).await {
            Ok(user) => Ok(user),
            Err(e @ (StorageError::UserNotFound | StorageError::BadPassword)) => {
                debug!("🧑️ Sign-in rejected: {e}");
                Err(UserApiError::InvalidCredentials)
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Records a freshly uploaded order (status `NEW`, zero accrual). When the number was uploaded before, the
    /// error distinguishes whose order it is. Returns the stored order so the caller can hand it to the updater.
    pub async fn add_order(&self, user_id: i64, number: &str) -> Result<Order, UserApiError> {
        if !luhn::is_valid(number) {
            return Err(UserApiError::InvalidOrderNumber);
        }
        let order = Order::new(OrderNumber::from(number), user_id, Utc::now());
        match self.store.add_order(&order).await {
            Ok(()) => Ok(order),
            Err(StorageError::OrderAlreadyExists) => {
                let existing = self.store.order_by_number(&order.number).await?;
                if existing.user_id == user_id {
                    Err(UserApiError::RepeatedOrderRequest)
                } else {
                    Err(UserApiError::ForeignOrder)
                }
            },
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_orders(&self, user_id: i64) -> Result<Vec<Order>, UserApiError> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    pub async fn get_balance(&self, user_id: i64) -> Result<Balance, UserApiError> {
        Ok(self.store.user_balance(user_id).await?)
    }

    pub async fn get_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, UserApiError> {
        Ok(self.store.withdrawals_for_user(user_id).await?)
    }

    /// Applies points toward a new order number. The balance read here is a best-effort fast path; the
    /// authoritative guard is the storage layer's atomic non-negative debit.
    pub async fn withdraw(&self, user_id: i64, order_number: &str, sum: Points) -> Result<(), UserApiError> {
        if !sum.is_positive() {
            return Err(UserApiError::InvalidWithdrawalSum);
        }
        if !luhn::is_valid(order_number) {
            return Err(UserApiError::InvalidOrderNumber);
        }
        let balance = self.store.user_balance(user_id).await?;
        if balance.current < sum {
            return Err(UserApiError::InsufficientFunds);
        }
        let withdrawal = Withdrawal {
            user_id,
            order_number: OrderNumber::from(order_number),
            sum,
            processed_at: Utc::now(),
        };
        match self.store.add_withdrawal(&withdrawal).await {
            Ok(()) => {
                info!("🧑️ User #{user_id} withdrew {sum} points against order [{}]", withdrawal.order_number);
                Ok(())
            },
            Err(StorageError::InsufficientFunds) => Err(UserApiError::InsufficientFunds),
            Err(e) => Err(e.into()),
        }
    }
}
