//! Error type for `muster-store-sqlite`.

use muster_core::record::RecordId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] muster_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A stored row could not be decoded into a document.
  #[error("malformed incident {id}: {reason}")]
  Malformed { id: String, reason: String },

  #[error("incident not found: {0}")]
  NotFound(RecordId),
}

impl Error {
  /// `true` once the underlying connection has been closed.
  pub fn is_closed(&self) -> bool {
    matches!(self, Self::Database(tokio_rusqlite::Error::ConnectionClosed))
  }
}

impl From<Error> for muster_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      Error::NotFound(id) => Self::NotFound(id),
      other => Self::Write(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
