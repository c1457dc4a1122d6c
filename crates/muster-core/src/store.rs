//! The `IncidentStore` trait: the whole store boundary the core consumes.
//!
//! Implemented by storage backends (e.g. `muster-store-sqlite`). Higher layers
//! (`muster-api`, the server) depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  record::{IncidentPatch, NewIncident, RecordId},
  subscription::Subscription,
};

/// Abstraction over the single incident collection.
///
/// Reads happen only through [`IncidentStore::subscribe`]; writes never
/// return or patch a snapshot; their effect is observed on the next push.
///
/// All write methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait IncidentStore: Send + Sync {
  /// Backend error. Converting into [`crate::Error`] must map a missing
  /// document to [`crate::Error::NotFound`] and any other failure to
  /// [`crate::Error::Write`].
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  /// Open a live, ordered (`dateAdded` descending) subscription over the
  /// collection. Never fails: setup problems arrive as the first event.
  fn subscribe(&self) -> Subscription;

  /// Persist a new incident and return its store-assigned id. The store sets
  /// the `createdAt` audit field, and `dateAdded` when the input has none.
  fn create(
    &self,
    input: NewIncident,
  ) -> impl Future<Output = Result<RecordId, Self::Error>> + Send + '_;

  /// Merge `patch` into the incident `id`. Fails if `id` does not exist.
  fn update(
    &self,
    id: RecordId,
    patch: IncidentPatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove the incident `id`. Deleting an unknown id succeeds.
  fn delete(
    &self,
    id: RecordId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
