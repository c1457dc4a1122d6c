//! Live subscription plumbing shared by every store backend.
//!
//! A store's background task owns a [`SubscriptionSink`] and pushes complete
//! snapshots (or errors) into it; the consumer owns the matching
//! [`Subscription`] and pulls [`SnapshotEvent`]s out. Both ends share one
//! [`CancelHandle`]: cancelling (or dropping the `Subscription`) stops all
//! further deliveries and lets the background task exit.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::{Error, snapshot::Snapshot, store::IncidentStore};

/// Snapshots buffered between a store task and a slow consumer.
pub const SNAPSHOT_BUFFER: usize = 16;

/// One delivery from a live subscription.
#[derive(Debug)]
pub enum SnapshotEvent {
  /// The complete current ordered record set.
  Snapshot(Snapshot),
  /// The query or transport failed for this change. The held snapshot stays
  /// valid; later changes may still deliver.
  Error(Error),
}

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Stops a subscription. Cheap to clone; cancelling is idempotent.
#[derive(Debug, Clone)]
pub struct CancelHandle {
  tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
  fn pair() -> (Self, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (Self { tx: Arc::new(tx) }, CancelSignal { rx })
  }

  /// A handle attached to nothing. Cancelling it is a harmless no-op.
  pub fn noop() -> Self { Self::pair().0 }

  pub fn cancel(&self) {
    if !self.tx.send_replace(true) {
      tracing::debug!("subscription cancelled");
    }
  }

  pub fn is_cancelled(&self) -> bool { *self.tx.borrow() }
}

/// The producer side's view of a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
  rx: watch::Receiver<bool>,
}

impl CancelSignal {
  /// Resolves once cancelled, or once every handle has been dropped.
  pub async fn cancelled(&mut self) {
    let _ = self.rx.wait_for(|cancelled| *cancelled).await;
  }

  pub fn is_cancelled(&self) -> bool { *self.rx.borrow() }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// The consumer end of a live subscription.
#[derive(Debug)]
pub struct Subscription {
  events: mpsc::Receiver<SnapshotEvent>,
  cancel: CancelHandle,
}

/// The producer end of a live subscription, owned by a store task.
#[derive(Debug)]
pub struct SubscriptionSink {
  tx:     mpsc::Sender<SnapshotEvent>,
  signal: CancelSignal,
}

impl Subscription {
  /// Create a connected consumer/producer pair.
  pub fn channel() -> (Self, SubscriptionSink) {
    let (tx, events) = mpsc::channel(SNAPSHOT_BUFFER);
    let (cancel, signal) = CancelHandle::pair();
    (Self { events, cancel }, SubscriptionSink { tx, signal })
  }

  /// A subscription that could not be set up: it yields `error` once and
  /// then ends. Its handle cancels nothing.
  pub fn failed(error: Error) -> Self {
    let (subscription, sink) = Self::channel();
    if sink.tx.try_send(SnapshotEvent::Error(error)).is_err() {
      tracing::warn!("could not queue subscription setup error");
    }
    subscription
  }

  /// Wait for the next delivery. `None` once cancelled or once the store
  /// side has gone away.
  pub async fn next_event(&mut self) -> Option<SnapshotEvent> {
    if self.cancel.is_cancelled() {
      self.events.close();
      return None;
    }
    let event = self.events.recv().await?;
    // A cancel that raced the receive wins.
    if self.cancel.is_cancelled() {
      self.events.close();
      return None;
    }
    Some(event)
  }

  pub fn cancel_handle(&self) -> CancelHandle { self.cancel.clone() }

  pub fn cancel(&self) { self.cancel.cancel(); }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.cancel.cancel(); }
}

impl SubscriptionSink {
  /// Push one event. Returns `false` when the subscription has been
  /// cancelled or its consumer dropped; the caller should stop.
  pub async fn deliver(&mut self, event: SnapshotEvent) -> bool {
    if self.signal.is_cancelled() {
      return false;
    }
    tokio::select! {
      sent = self.tx.send(event) => sent.is_ok(),
      () = self.signal.cancelled() => false,
    }
  }

  /// Resolves once the consumer cancels or goes away.
  pub async fn closed(&mut self) {
    tokio::select! {
      () = self.tx.closed() => {}
      () = self.signal.cancelled() => {}
    }
  }

  pub fn is_closed(&self) -> bool { self.tx.is_closed() || self.signal.is_cancelled() }
}

// ─── Callback form ───────────────────────────────────────────────────────────

/// Subscribe with callbacks instead of pulling events.
///
/// `on_update` receives every snapshot, `on_error` every failure, each on a
/// spawned task. The returned handle must be cancelled when the owner is
/// done; after [`CancelHandle::cancel`] returns no new callback starts.
///
/// Outside a tokio runtime nothing can be spawned: `on_error` is called once
/// with a [`Error::Connection`] and a no-op handle is returned.
pub fn subscribe_with<S, U, E>(store: &S, mut on_update: U, mut on_error: E) -> CancelHandle
where
  S: IncidentStore + ?Sized,
  U: FnMut(Snapshot) + Send + 'static,
  E: FnMut(Error) + Send + 'static,
{
  let runtime = match tokio::runtime::Handle::try_current() {
    Ok(runtime) => runtime,
    Err(e) => {
      on_error(Error::Connection(format!("no async runtime: {e}")));
      return CancelHandle::noop();
    }
  };

  let mut subscription = store.subscribe();
  let handle = subscription.cancel_handle();
  runtime.spawn(async move {
    while let Some(event) = subscription.next_event().await {
      match event {
        SnapshotEvent::Snapshot(snapshot) => on_update(snapshot),
        SnapshotEvent::Error(error) => on_error(error),
      }
    }
  });
  handle
}
