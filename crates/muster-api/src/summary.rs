//! Handler for `POST /summary`.

use axum::{Json, extract::State};
use muster_core::{record::IncidentRecord, roster::SubRegion, store::IncidentStore};
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::Authenticated, error::ApiError};

/// Label used when the request names no scope.
pub const DEFAULT_LABEL: &str = "all sub-regions";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
  /// Free-text name for the report scope.
  pub label:      Option<String>,
  /// Restrict the report to one sub-region.
  pub sub_region: Option<SubRegion>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
  pub summary: String,
}

/// `POST /summary`, supervisor only. Body: `{"label"?: …, "subRegion"?: …}`.
pub async fn summarize<S>(
  auth: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, ApiError>
where
  S: IncidentStore + 'static,
{
  auth.require_supervisor()?;

  let snapshot = state.view.snapshot();
  let records: Vec<IncidentRecord> = match body.sub_region {
    Some(region) => snapshot
      .records()
      .iter()
      .filter(|r| r.sub_region == region.label())
      .cloned()
      .collect(),
    None => snapshot.records().to_vec(),
  };
  let label = body
    .label
    .or_else(|| body.sub_region.map(|r| r.label().to_owned()))
    .unwrap_or_else(|| DEFAULT_LABEL.to_owned());

  tracing::info!(%label, records = records.len(), "requesting summary");
  let summary = state.summarizer.summarize(&records, &label).await?;
  Ok(Json(SummaryResponse { summary }))
}
