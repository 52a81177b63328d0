//! SQLite backend for the Rondas material exchange.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every operation is a synchronous
//! function over a borrowed connection or transaction; [`SqliteStore`] only
//! ships those functions to the database thread.

mod accounts;
mod encode;
mod registry;
mod repository;
mod schema;
mod search;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
