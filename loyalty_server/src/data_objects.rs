//! JSON shapes of the HTTP API.

use chrono::{DateTime, Utc};
use lgw_common::Points;
use loyalty_engine::db_types::{Order, OrderStatus, Withdrawal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Points,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    pub number: String,
    pub status: OrderStatus,
    /// Omitted until the order has actually earned something.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderResult {
    fn from(order: Order) -> Self {
        let accrual = if order.accrual.is_zero() { None } else { Some(order.accrual) };
        Self { number: order.number.0, status: order.status, accrual, uploaded_at: order.uploaded_at }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalResult {
    pub order: String,
    pub sum: Points,
    pub processed_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalResult {
    fn from(w: Withdrawal) -> Self {
        Self { order: w.order_number.0, sum: w.sum, processed_at: w.processed_at }
    }
}
