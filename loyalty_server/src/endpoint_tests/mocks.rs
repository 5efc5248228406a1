use std::sync::Mutex;

use async_trait::async_trait;
use loyalty_engine::{
    db_types::{Balance, Order, OrderNumber, OrderStatus, User, Withdrawal},
    traits::{LoyaltyStore, StorageError},
    OrderSink, UpdaterError,
};
use mockall::mock;

mock! {
    pub Store {}

    #[async_trait]
    impl LoyaltyStore for Store {
        async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, StorageError>;
        async fn user_by_credentials(&self, login: &str, password_hash: &str) -> Result<User, StorageError>;
        async fn add_order(&self, order: &Order) -> Result<(), StorageError>;
        async fn order_by_number(&self, number: &OrderNumber) -> Result<Order, StorageError>;
        async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StorageError>;
        async fn orders_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StorageError>;
        async fn update_orders(&self, batch: &[Order]) -> Result<(), StorageError>;
        async fn add_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StorageError>;
        async fn user_balance(&self, user_id: i64) -> Result<Balance, StorageError>;
        async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, StorageError>;
    }

    impl Clone for Store {
        fn clone(&self) -> Self;
    }
}

/// Records everything the handlers hand to the updater.
#[derive(Default)]
pub struct StubSink {
    submitted: Mutex<Vec<Order>>,
}

impl StubSink {
    pub fn submitted(&self) -> Vec<Order> {
        self.submitted.lock().unwrap().clone()
    }
}

impl OrderSink for StubSink {
    fn submit(&self, order: Order) -> Result<(), UpdaterError> {
        self.submitted.lock().unwrap().push(order);
        Ok(())
    }

    fn submit_many(&self, orders: Vec<Order>) -> Result<(), UpdaterError> {
        self.submitted.lock().unwrap().extend(orders);
        Ok(())
    }
}
