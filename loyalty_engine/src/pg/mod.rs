//! `PgDatabase` is the PostgreSQL implementation of the [`crate::traits::LoyaltyStore`] contract.
//!
//! Layout follows a two-level split: `db` holds per-entity query functions that operate on a plain connection, and
//! `pg_impl` composes them into transactions.

pub(crate) mod db;
mod pg_impl;

pub use pg_impl::PgDatabase;
