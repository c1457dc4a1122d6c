//! Handlers for `GET /stats` and `GET /status`.

use axum::{Json, extract::State};
use muster_core::{session::Status, stats::Stats, store::IncidentStore};

use crate::{AppState, auth::Authenticated};

/// `GET /stats`: tallies over every record the caller may see.
pub async fn stats<S>(
  Authenticated(principal): Authenticated,
  State(state): State<AppState<S>>,
) -> Json<Stats>
where
  S: IncidentStore + 'static,
{
  let snapshot = state.view.snapshot();
  Json(Stats::for_roster(principal.scope(snapshot.records())))
}

/// `GET /status`: live-view connectivity; `total` counts the caller's
/// records.
pub async fn status<S>(
  Authenticated(principal): Authenticated,
  State(state): State<AppState<S>>,
) -> Json<Status>
where
  S: IncidentStore + 'static,
{
  let session = state.view.read();
  let mut status = session.status();
  status.total = principal.scope(session.snapshot().records()).len();
  Json(status)
}
