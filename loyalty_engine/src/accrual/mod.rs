//! Typed client for the external accrual service.
//!
//! The service is read-only from our side: one `GET /api/orders/{number}` per tracked order. Every response is
//! folded into the closed [`AccrualOutcome`] set; retry policy lives in the updater, not here.

use std::time::Duration;

use async_trait::async_trait;
use lgw_common::Points;
use serde::Deserialize;

use crate::db_types::OrderNumber;

mod http;

pub use http::HttpAccrualClient;

//--------------------------------------    AccrualStatus    ---------------------------------------------------------
/// The lifecycle the accrual service reports for an order. Anything outside the documented set deserialises to
/// `Unknown`, which the updater treats as a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
    #[serde(other)]
    Unknown,
}

/// The body of a 200 response: `{ "order": …, "status": …, "accrual": … }` with `accrual` present only once the
/// calculation is complete.
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualReply {
    pub order: OrderNumber,
    pub status: AccrualStatus,
    #[serde(default)]
    pub accrual: Option<Points>,
}

//--------------------------------------    AccrualOutcome    --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualOutcome {
    /// The service knows the order and reported its current state.
    Known { status: AccrualStatus, accrual: Option<Points> },
    /// The service does not (yet) know this order.
    NoContent,
    /// The service asked us to back off for `retry_after`.
    RateLimited { retry_after: Duration },
    /// The service answered 5xx.
    RemoteError,
    /// Network failure, malformed body, unexpected status, or a 429 without a usable `Retry-After`.
    TransportError,
}

//--------------------------------------    AccrualClient     --------------------------------------------------------
#[async_trait]
pub trait AccrualClient: Send + Sync {
    async fn get_accrual(&self, order_number: &OrderNumber) -> AccrualOutcome;
}
