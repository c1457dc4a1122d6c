//! Error types for `muster-core`.

use thiserror::Error;

use crate::record::RecordId;

#[derive(Debug, Error)]
pub enum Error {
  /// Store initialization or subscription setup failed.
  #[error("connection error: {0}")]
  Connection(String),

  /// An established subscription reported a failure.
  #[error("snapshot error: {0}")]
  Snapshot(String),

  /// A create/update/delete was rejected or the store was unreachable.
  #[error("write error: {0}")]
  Write(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("incident not found: {0}")]
  NotFound(RecordId),

  #[error("summarization failed: {0}")]
  Summarization(String),

  #[error("invalid incident: {0}")]
  InvalidRecord(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Convenience constructor for a [`Error::Write`] carrying a plain message.
  pub fn write(message: impl Into<String>) -> Self {
    let message: String = message.into();
    Self::Write(message.into())
  }

  /// `true` for the failures a session surfaces as "offline".
  pub fn is_connectivity(&self) -> bool {
    matches!(self, Self::Connection(_) | Self::Snapshot(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
