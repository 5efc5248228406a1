//! # Loyalty gateway server
//!
//! The HTTP front-end of the loyalty gateway. It is responsible for:
//! * serving the `/api/user` endpoints (registration, login, order upload, balances, withdrawals),
//! * authenticating requests via the `AccessToken` cookie,
//! * bootstrapping the reconciliation engine at start-up and shutting it down cleanly on exit.
//!
//! ## Configuration
//! The server is configured by environment variables, with command-line flags as fallback.
//! See [config](config/index.html).

pub mod auth;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
