//! SQLite backend for the Tally forum store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each mutating call is one
//! `BEGIN IMMEDIATE` transaction; the counters, vote rows and the derived
//! scores recomputed from them commit together.

mod encode;
mod ledger;
mod query;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
