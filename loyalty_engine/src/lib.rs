//! Loyalty Engine
//!
//! The loyalty engine is the core of the loyalty-points gateway. It owns everything between the HTTP layer and the
//! external accrual service:
//! 1. Durable storage of users, orders and withdrawals, with the balance invariants enforced inside database
//!    transactions. PostgreSQL is the supported backend; access it through [`PgDatabase`] or, generically, through
//!    the [`traits::LoyaltyStore`] contract.
//! 2. The accrual client, a typed wrapper over the remote accrual HTTP service.
//! 3. The order updater, the long-running reconciliation engine that polls the accrual service for every
//!    non-terminal order and batches status transitions back into storage.
//! 4. The user API, the application-level operations invoked by request handlers.

pub mod accrual;
pub mod api;
pub mod db_types;
pub mod helpers;
pub mod traits;
pub mod updater;

mod pg;

pub use api::{UserApi, UserApiError};
pub use pg::PgDatabase;
pub use updater::{OrderSink, OrderUpdater, UpdaterConfig, UpdaterError};
