//! Core types and trait definitions for the Muster incident console.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the synchronization and aggregation core: value normalization, the live
//! subscription contract, record mutators, aggregation, filtering and the
//! session view that everything else renders from.

// Native `async fn` / `impl Future` in traits; the futures are `Send` where it
// matters.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod error;
pub mod filter;
pub mod mutate;
pub mod record;
pub mod roster;
pub mod session;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod subscription;
pub mod summary;
pub mod value;

pub use error::{Error, Result};
