//! A lazily opened, shared store.

use std::path::PathBuf;

use tokio::sync::OnceCell;

use crate::{Result, SqliteStore};

/// Where a [`StoreHandle`] opens its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
  Memory,
  File(PathBuf),
}

/// Opens the store at most once. Concurrent and repeated callers of
/// [`StoreHandle::get_or_open`] all receive the same [`SqliteStore`]; a
/// failed open is not cached and the next call tries again.
#[derive(Debug)]
pub struct StoreHandle {
  location: StoreLocation,
  store:    OnceCell<SqliteStore>,
}

impl StoreHandle {
  pub fn new(location: StoreLocation) -> Self {
    Self { location, store: OnceCell::new() }
  }

  pub fn location(&self) -> &StoreLocation { &self.location }

  pub async fn get_or_open(&self) -> Result<&SqliteStore> {
    self
      .store
      .get_or_try_init(|| async {
        tracing::info!(location = ?self.location, "opening incident store");
        match &self.location {
          StoreLocation::Memory => SqliteStore::open_in_memory().await,
          StoreLocation::File(path) => SqliteStore::open(path).await,
        }
      })
      .await
  }
}
