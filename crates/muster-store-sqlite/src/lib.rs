//! SQLite backend for the Muster incident collection.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Subscriptions are served by a
//! background task per subscriber that reloads the ordered snapshot on every
//! detected change.

mod encode;
mod handle;
mod schema;
mod store;
mod watch;

pub mod error;

pub use error::{Error, Result};
pub use handle::{StoreHandle, StoreLocation};
pub use store::{DEFAULT_POLL_INTERVAL, SqliteStore};
