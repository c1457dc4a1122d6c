//! HTTP server for Muster.
//!
//! Wires a [`SqliteStore`], the configured PINs and summarizer into the
//! [`muster_api`] router and mounts it under `/api`.

pub mod config;
pub mod error;
pub mod summarizer;

pub use error::Error;

use std::sync::Arc;

use axum::Router;
use muster_api::AppState;
use muster_core::{
  access::Principal,
  session::LiveView,
  summary::{NoSummarizer, Summarizer},
};
use muster_store_sqlite::SqliteStore;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::summarizer::GeminiSummarizer;

// ─── State ────────────────────────────────────────────────────────────────────

/// Build the shared application state around an opened store.
///
/// The live view starts immediately, so this must run inside a Tokio runtime.
pub fn build_state(cfg: &ServerConfig, store: SqliteStore) -> Result<AppState<SqliteStore>, Error> {
  let pins = cfg.pin_table()?;
  let summarizer: Arc<dyn Summarizer> = match &cfg.summarizer {
    Some(s) => {
      tracing::info!(model = %s.model, "summarization enabled");
      Arc::new(GeminiSummarizer::new(s)?)
    }
    None => {
      tracing::info!("no summarizer configured; /api/summary will fail");
      Arc::new(NoSummarizer)
    }
  };

  let store = store.with_poll_interval(cfg.poll_interval());
  let view = LiveView::start(&store, Principal::supervisor());

  Ok(AppState {
    store: Arc::new(store),
    view,
    summarizer,
    pins: Arc::new(pins),
  })
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the API under `/api` plus request tracing.
pub fn router(state: AppState<SqliteStore>) -> Router {
  Router::new()
    .nest("/api", muster_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
