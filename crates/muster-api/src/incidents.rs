//! Handlers for `/incidents` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/incidents` | Optional `?q=`; scoped to the caller; `ETag` / `If-None-Match` |
//! | `POST`   | `/incidents` | Body: a flat incident document; `201 {"id":…}` |
//! | `PATCH`  | `/incidents/{id}` | Supervisor only; `204`, `404` if unknown |
//! | `DELETE` | `/incidents/{id}` | Supervisor only; `204`, also for unknown ids |
//!
//! Writes never answer with records: the new state is served once the live
//! view has received the store's next snapshot.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use muster_core::{
  filter::filter,
  mutate,
  record::{IncidentPatch, NewIncident, RecordId},
  store::IncidentStore,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  etag::{compute_etag, not_modified},
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  /// Case-insensitive search over name, state code and sub-region.
  pub q: Option<String>,
}

/// `GET /incidents[?q=<text>]`
pub async fn list<S>(
  Authenticated(principal): Authenticated,
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: IncidentStore + 'static,
{
  let snapshot = state.view.snapshot();
  let scoped = principal.scope(snapshot.records());
  let visible = filter(scoped, params.q.as_deref().unwrap_or_default());

  let etag = compute_etag(&visible).map_err(|e| ApiError::Internal(e.to_string()))?;
  if not_modified(&headers, &etag) {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }
  Ok(([(header::ETAG, etag)], Json(visible)).into_response())
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /incidents`
pub async fn create<S>(
  Authenticated(principal): Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<NewIncident>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IncidentStore + 'static,
{
  if !principal.can_write_region(body.sub_region) {
    return Err(ApiError::Forbidden(format!(
      "cannot file incidents for {}",
      body.sub_region
    )));
  }
  let id = mutate::create(state.store.as_ref(), body).await?;
  Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /incidents/{id}`
pub async fn update<S>(
  auth: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  Json(patch): Json<IncidentPatch>,
) -> Result<StatusCode, ApiError>
where
  S: IncidentStore + 'static,
{
  auth.require_supervisor()?;
  mutate::update(state.store.as_ref(), RecordId::new(id), patch).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /incidents/{id}`
pub async fn delete<S>(
  auth: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: IncidentStore + 'static,
{
  auth.require_supervisor()?;
  mutate::delete(state.store.as_ref(), RecordId::new(id)).await?;
  Ok(StatusCode::NO_CONTENT)
}
