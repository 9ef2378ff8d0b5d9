//! Core types and trait definitions for the Laurel forecasting pipeline.
//!
//! This crate is deliberately free of numeric, HTTP and database
//! dependencies. Every other crate depends on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod candidate;
pub mod error;
pub mod feature;
pub mod prediction;
pub mod store;

pub use error::{Error, Result};
