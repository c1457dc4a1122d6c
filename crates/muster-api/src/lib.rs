//! JSON REST API for Muster.
//!
//! Exposes an axum [`Router`] backed by any [`IncidentStore`]. Reads are
//! served from a [`LiveView`] that follows the store's subscription; writes go
//! through the record mutators. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", muster_api::api_router(state))
//! ```

pub mod auth;
pub mod error;
pub mod etag;
pub mod incidents;
pub mod stats;
pub mod summary;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post},
};
use muster_core::{session::LiveView, store::IncidentStore, summary::Summarizer};

pub use auth::{Authenticated, PinTable};
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:      Arc<S>,
  /// Supervisor-wide view; handlers narrow it to the caller.
  pub view:       LiveView,
  pub summarizer: Arc<dyn Summarizer>,
  pub pins:       Arc<PinTable>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      self.store.clone(),
      view:       self.view.clone(),
      summarizer: self.summarizer.clone(),
      pins:       self.pins.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: IncidentStore + 'static,
{
  Router::new()
    .route("/incidents", get(incidents::list::<S>).post(incidents::create::<S>))
    .route(
      "/incidents/{id}",
      patch(incidents::update::<S>).delete(incidents::delete::<S>),
    )
    .route("/stats", get(stats::stats::<S>))
    .route("/status", get(stats::status::<S>))
    .route("/summary", post(summary::summarize::<S>))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
