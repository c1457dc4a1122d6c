//! View/session state: the held snapshot plus everything derived from it.
//!
//! A [`Session`] is driven entirely by [`SnapshotEvent`]s and the search
//! query. Derived state (stats, the visible subsequence) is recomputed in
//! full on every change, never patched.
//!
//! [`LiveView`] wraps a session in a background task that consumes a store
//! subscription, so many readers can share one always-current view.

use std::sync::{Arc, RwLock, RwLockReadGuard, Weak};

use serde::Serialize;
use tokio::sync::watch;

use crate::{
  Error,
  access::Principal,
  filter,
  record::IncidentRecord,
  snapshot::Snapshot,
  stats::Stats,
  store::IncidentStore,
  subscription::{CancelHandle, SnapshotEvent},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
  /// No snapshot or error has arrived yet.
  Connecting,
  /// The last event was a snapshot.
  Online,
  /// The last event was an error; the held snapshot may be stale.
  Offline,
}

/// Connectivity summary served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
  pub state:      ConnectionState,
  pub last_error: Option<String>,
  pub total:      usize,
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Session {
  principal:  Principal,
  snapshot:   Snapshot,
  state:      ConnectionState,
  last_error: Option<String>,
  query:      String,
  stats:      Stats,
  /// Indices into `snapshot` of the scoped records matching `query`.
  visible:    Vec<usize>,
}

impl Session {
  pub fn new(principal: Principal) -> Self {
    let mut session = Self {
      principal,
      snapshot: Snapshot::default(),
      state: ConnectionState::Connecting,
      last_error: None,
      query: String::new(),
      stats: Stats::default(),
      visible: Vec::new(),
    };
    session.recompute();
    session
  }

  /// Apply one subscription delivery.
  pub fn apply(&mut self, event: SnapshotEvent) {
    match event {
      SnapshotEvent::Snapshot(snapshot) => {
        if self.state != ConnectionState::Online {
          tracing::info!(records = snapshot.len(), "session online");
        }
        self.snapshot = snapshot;
        self.state = ConnectionState::Online;
        self.last_error = None;
        self.recompute();
      }
      SnapshotEvent::Error(error) => {
        tracing::warn!(%error, "session offline");
        self.state = ConnectionState::Offline;
        self.last_error = Some(error.to_string());
      }
    }
  }

  pub fn set_query(&mut self, query: impl Into<String>) {
    self.query = query.into();
    self.recompute_visible();
  }

  fn recompute(&mut self) {
    self.stats = Stats::for_roster(self.principal.scope(self.snapshot.records()));
    self.recompute_visible();
  }

  fn recompute_visible(&mut self) {
    let needle = self.query.to_lowercase();
    self.visible = self
      .snapshot
      .records()
      .iter()
      .enumerate()
      .filter(|(_, r)| self.principal.can_see(r))
      .filter(|(_, r)| needle.is_empty() || filter::matches(r, &needle))
      .map(|(i, _)| i)
      .collect();
  }

  /// The scoped records matching the current query, in snapshot order.
  pub fn visible(&self) -> Vec<&IncidentRecord> {
    let records = self.snapshot.records();
    self.visible.iter().map(|&i| &records[i]).collect()
  }

  /// Stats over every scoped record, regardless of the query.
  pub fn stats(&self) -> &Stats { &self.stats }

  pub fn snapshot(&self) -> &Snapshot { &self.snapshot }

  pub fn principal(&self) -> Principal { self.principal }

  pub fn query(&self) -> &str { &self.query }

  pub fn state(&self) -> ConnectionState { self.state }

  pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }

  pub fn status(&self) -> Status {
    Status {
      state:      self.state,
      last_error: self.last_error.clone(),
      total:      self.stats.total,
    }
  }
}

// ─── LiveView ────────────────────────────────────────────────────────────────

/// A shared session kept current by a store subscription.
///
/// Cheap to clone. When the last clone is dropped the subscription is
/// cancelled and the background task exits.
#[derive(Debug, Clone)]
pub struct LiveView {
  inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
  session:    RwLock<Session>,
  cancel:     CancelHandle,
  /// Bumped after every applied event.
  generation: watch::Sender<u64>,
}

impl Drop for Inner {
  fn drop(&mut self) { self.cancel.cancel(); }
}

impl LiveView {
  /// Subscribe to `store` and keep a session for `principal` current.
  ///
  /// Outside a tokio runtime the view starts offline with a
  /// [`Error::Connection`] and never updates.
  pub fn start<S>(store: &S, principal: Principal) -> Self
  where
    S: IncidentStore + ?Sized,
  {
    let (generation, _) = watch::channel(0);
    let runtime = match tokio::runtime::Handle::try_current() {
      Ok(runtime) => runtime,
      Err(e) => {
        let mut session = Session::new(principal);
        session.apply(SnapshotEvent::Error(Error::Connection(format!(
          "no async runtime: {e}"
        ))));
        let inner = Inner {
          session: RwLock::new(session),
          cancel: CancelHandle::noop(),
          generation,
        };
        return Self { inner: Arc::new(inner) };
      }
    };

    let mut subscription = store.subscribe();
    let inner = Arc::new(Inner {
      session: RwLock::new(Session::new(principal)),
      cancel: subscription.cancel_handle(),
      generation,
    });

    let weak: Weak<Inner> = Arc::downgrade(&inner);
    runtime.spawn(async move {
      while let Some(event) = subscription.next_event().await {
        let Some(inner) = weak.upgrade() else { break };
        inner.write().apply(event);
        inner.generation.send_modify(|g| *g += 1);
      }
      tracing::debug!("live view task finished");
    });

    Self { inner }
  }

  /// Read the current session. Do not hold the guard across an `.await`.
  pub fn read(&self) -> RwLockReadGuard<'_, Session> {
    self.inner.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// A clone of the current snapshot.
  pub fn snapshot(&self) -> Snapshot { self.read().snapshot().clone() }

  pub fn status(&self) -> Status { self.read().status() }

  /// A receiver that changes every time an event has been applied.
  pub fn watch(&self) -> watch::Receiver<u64> { self.inner.generation.subscribe() }

  /// Wait until `predicate` holds for the session.
  pub async fn wait_until(&self, predicate: impl Fn(&Session) -> bool) {
    let mut changes = self.watch();
    loop {
      if predicate(&self.read()) {
        return;
      }
      if changes.changed().await.is_err() {
        return;
      }
    }
  }

  /// Stop following the store. The last session stays readable.
  pub fn stop(&self) { self.inner.cancel.cancel(); }
}

impl Inner {
  fn write(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
    self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::{
    record::{Document, IncidentPatch, NewIncident, RecordId},
    roster::SubRegion,
    subscription::{Subscription, SubscriptionSink},
  };

  fn document(id: &str, name: &str, region: &str) -> Document {
    Document::from_json(serde_json::json!({
      "id": id,
      "name": name,
      "stateCode": format!("KT/{id}"),
      "subRegion": region,
      "category": "Missing",
    }))
    .unwrap()
  }

  fn snapshot(docs: Vec<Document>) -> SnapshotEvent {
    SnapshotEvent::Snapshot(Snapshot::from_documents(docs))
  }

  #[test]
  fn snapshot_brings_session_online() {
    let mut session = Session::new(Principal::supervisor());
    assert_eq!(session.state(), ConnectionState::Connecting);
    assert_eq!(session.stats().per_sub_region.len(), 9);

    session.apply(snapshot(vec![document("1", "Amina", "Daura")]));
    assert_eq!(session.state(), ConnectionState::Online);
    assert_eq!(session.stats().total, 1);
    assert_eq!(session.visible().len(), 1);
  }

  #[test]
  fn error_keeps_the_held_snapshot() {
    let mut session = Session::new(Principal::supervisor());
    session.apply(snapshot(vec![document("1", "Amina", "Daura")]));
    session.apply(SnapshotEvent::Error(Error::Snapshot("query failed".into())));

    assert_eq!(session.state(), ConnectionState::Offline);
    assert_eq!(session.last_error(), Some("snapshot error: query failed"));
    assert_eq!(session.snapshot().len(), 1);

    session.apply(snapshot(vec![]));
    assert_eq!(session.state(), ConnectionState::Online);
    assert_eq!(session.last_error(), None);
    assert_eq!(session.stats().total, 0);
  }

  #[test]
  fn query_narrows_visible_but_not_stats() {
    let mut session = Session::new(Principal::supervisor());
    session.apply(snapshot(vec![
      document("1", "Amina", "Daura"),
      document("2", "Musa", "Mani"),
      document("3", "Aminu", "Funtua"),
    ]));
    session.set_query("AMIN");
    let ids: Vec<_> = session.visible().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["1", "3"]);
    assert_eq!(session.stats().total, 3);

    session.set_query("Amina ");
    assert!(session.visible().is_empty());

    session.set_query("");
    assert_eq!(session.visible().len(), 3);
  }

  #[test]
  fn officer_session_is_scoped() {
    let mut session = Session::new(Principal::officer(SubRegion::Mani));
    session.apply(snapshot(vec![
      document("1", "Amina", "Daura"),
      document("2", "Musa", "Mani"),
    ]));
    assert_eq!(session.stats().total, 1);
    assert_eq!(session.stats().per_sub_region.get("Daura"), Some(0));
    let ids: Vec<_> = session.visible().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["2"]);
  }

  /// Hands out one pre-built subscription; writes are unsupported.
  struct ScriptedStore {
    subscription: std::sync::Mutex<Option<Subscription>>,
  }

  impl ScriptedStore {
    fn new() -> (Self, SubscriptionSink) {
      let (subscription, sink) = Subscription::channel();
      (Self { subscription: std::sync::Mutex::new(Some(subscription)) }, sink)
    }
  }

  impl IncidentStore for ScriptedStore {
    type Error = Error;

    fn subscribe(&self) -> Subscription {
      self
        .subscription
        .lock()
        .unwrap()
        .take()
        .unwrap_or_else(|| Subscription::failed(Error::Connection("already taken".into())))
    }

    async fn create(&self, _: NewIncident) -> Result<RecordId, Error> {
      Err(Error::write("read-only"))
    }

    async fn update(&self, _: RecordId, _: IncidentPatch) -> Result<(), Error> {
      Err(Error::write("read-only"))
    }

    async fn delete(&self, _: RecordId) -> Result<(), Error> { Err(Error::write("read-only")) }
  }

  #[tokio::test]
  async fn live_view_follows_the_subscription() {
    let (store, mut sink) = ScriptedStore::new();
    let view = LiveView::start(&store, Principal::supervisor());

    assert!(sink.deliver(snapshot(vec![document("1", "Amina", "Daura")])).await);
    tokio::time::timeout(
      Duration::from_secs(5),
      view.wait_until(|s| s.state() == ConnectionState::Online),
    )
    .await
    .unwrap();
    assert_eq!(view.snapshot().len(), 1);

    assert!(sink.deliver(SnapshotEvent::Error(Error::Snapshot("boom".into()))).await);
    tokio::time::timeout(
      Duration::from_secs(5),
      view.wait_until(|s| s.state() == ConnectionState::Offline),
    )
    .await
    .unwrap();
    assert_eq!(view.status().total, 1);
  }

  #[tokio::test]
  async fn dropping_the_view_cancels_the_subscription() {
    let (store, mut sink) = ScriptedStore::new();
    let view = LiveView::start(&store, Principal::supervisor());
    let clone = view.clone();
    drop(view);
    assert!(!sink.is_closed());
    drop(clone);
    tokio::time::timeout(Duration::from_secs(5), sink.closed())
      .await
      .unwrap();
  }

  #[test]
  fn without_a_runtime_the_view_starts_offline() {
    let (store, _sink) = ScriptedStore::new();
    let view = LiveView::start(&store, Principal::supervisor());
    let status = view.status();
    assert_eq!(status.state, ConnectionState::Offline);
    assert!(status.last_error.unwrap().contains("no async runtime"));
  }
}
