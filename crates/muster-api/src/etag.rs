//! ETags for incident listings.
//!
//! The tag is a SHA-256 over the serialized listing, so it changes whenever
//! any visible record, its order or the set of visible records changes.

use axum::http::{HeaderMap, header};
use muster_core::record::IncidentRecord;
use sha2::{Digest, Sha256};

/// Compute a quoted strong ETag for `records`.
pub fn compute_etag(records: &[&IncidentRecord]) -> Result<String, serde_json::Error> {
  let body = serde_json::to_vec(records)?;
  let hash = Sha256::digest(&body);
  Ok(format!("\"{}\"", hex::encode(hash)))
}

/// Whether the request's `If-None-Match` already names `etag`.
pub fn not_modified(headers: &HeaderMap, etag: &str) -> bool {
  headers
    .get_all(header::IF_NONE_MATCH)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(','))
    .map(|tag| tag.trim().trim_start_matches("W/"))
    .any(|tag| tag == "*" || tag == etag)
}
