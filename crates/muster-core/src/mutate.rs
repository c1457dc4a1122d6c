//! Record mutators: create, update and delete against any [`IncidentStore`].
//!
//! Mutators validate their input, perform exactly one store round trip and
//! report the outcome. They never touch a held snapshot; a successful write
//! becomes visible through the subscription's next push. There is no retry.

use chrono::Utc;

use crate::{
  Error, Result,
  record::{IncidentPatch, NewIncident, RecordId},
  store::IncidentStore,
};

/// Create an incident. `dateAdded` defaults to now.
pub async fn create<S>(store: &S, mut input: NewIncident) -> Result<RecordId>
where
  S: IncidentStore + ?Sized,
{
  input.validate()?;
  input.date_added.get_or_insert_with(Utc::now);

  let category = input.incident.category_label().to_owned();
  let sub_region = input.sub_region;
  let id = store.create(input).await.map_err(Into::into)?;
  tracing::info!(%id, %category, %sub_region, "incident created");
  Ok(id)
}

/// Merge `patch` into the incident `id`.
pub async fn update<S>(store: &S, id: RecordId, patch: IncidentPatch) -> Result<()>
where
  S: IncidentStore + ?Sized,
{
  patch.validate()?;
  store
    .update(id.clone(), patch)
    .await
    .map_err(Into::into)?;
  tracing::info!(%id, "incident updated");
  Ok(())
}

/// Delete the incident `id`. An id the store does not know is not an error.
pub async fn delete<S>(store: &S, id: RecordId) -> Result<()>
where
  S: IncidentStore + ?Sized,
{
  match store.delete(id.clone()).await.map_err(Into::into) {
    Ok(()) | Err(Error::NotFound(_)) => {
      tracing::info!(%id, "incident deleted");
      Ok(())
    }
    Err(e) => {
      tracing::warn!(%id, error = %e, "delete failed");
      Err(e)
    }
  }
}
