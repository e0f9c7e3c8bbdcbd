//! Core types and trait definitions for the callbook licence mirror.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod codes;
pub mod error;
pub mod query;
pub mod record;
pub mod refresh;
pub mod store;
pub mod view;

pub use error::{Error, ParseError, Result};
