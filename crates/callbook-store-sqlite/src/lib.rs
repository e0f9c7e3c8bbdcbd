//! SQLite backend for the callbook licence mirror.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on dedicated
//! connection threads without blocking the async runtime. Queries go through
//! a small pool of reader connections; refreshes write through one writer.
//!
//! Each refresh loads a new *generation* of physical tables. The live
//! relations are views, and promotion re-points all four views in a single
//! transaction.

mod encode;
mod schema;
mod stage;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteOptions, SqliteStore};

#[cfg(test)]
mod tests;
