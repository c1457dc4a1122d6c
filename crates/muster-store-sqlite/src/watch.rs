//! The background task behind [`SqliteStore::subscribe`].
//!
//! The task reloads the full ordered snapshot whenever something changes:
//! immediately after a write through any clone of the store (broadcast
//! notification), or when `PRAGMA data_version` moves because another
//! connection committed. It exits when the subscription is cancelled or the
//! connection is closed.

use muster_core::{
  Error as CoreError,
  subscription::{SnapshotEvent, SubscriptionSink},
};
use tokio::{
  sync::broadcast::error::RecvError,
  time::{MissedTickBehavior, interval},
};

use crate::{Error, SqliteStore};

/// What the last load attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Health {
  /// Nothing loaded yet.
  Starting,
  Healthy { version: i64 },
  /// An error has been delivered; stay quiet until a load succeeds.
  Failing,
}

pub(crate) async fn run(store: SqliteStore, mut sink: SubscriptionSink) {
  let mut changes = store.changes();
  let mut ticker = interval(store.poll_interval());
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  let mut health = Health::Starting;
  let mut reload = true;
  tracing::debug!("subscription started");

  loop {
    if reload {
      reload = false;
      match store.load_snapshot().await {
        Ok((version, snapshot)) => {
          tracing::debug!(records = snapshot.len(), version, "delivering snapshot");
          health = Health::Healthy { version };
          if !sink.deliver(SnapshotEvent::Snapshot(snapshot)).await {
            break;
          }
        }
        Err(e) => {
          if !report(&mut sink, &mut health, e).await {
            break;
          }
        }
      }
    }

    let mut poll = false;
    tokio::select! {
      () = sink.closed() => break,
      changed = changes.recv() => match changed {
        Ok(()) => reload = true,
        Err(RecvError::Lagged(skipped)) => {
          tracing::debug!(skipped, "change notifications coalesced");
          reload = true;
        }
        Err(RecvError::Closed) => break,
      },
      _ = ticker.tick() => poll = true,
    }

    if poll {
      match store.data_version().await {
        Ok(version) => {
          reload = match health {
            Health::Healthy { version: seen } => seen != version,
            Health::Starting | Health::Failing => true,
          };
        }
        Err(e) => {
          if !report(&mut sink, &mut health, e).await {
            break;
          }
        }
      }
    }
  }

  tracing::debug!("subscription finished");
}

/// Deliver `error` if it starts a failure streak. Returns `false` when the
/// task should stop.
async fn report(sink: &mut SubscriptionSink, health: &mut Health, error: Error) -> bool {
  let closed = error.is_closed();
  let event = match *health {
    Health::Failing => None,
    Health::Starting => Some(CoreError::Connection(error.to_string())),
    Health::Healthy { .. } => Some(CoreError::Snapshot(error.to_string())),
  };
  *health = Health::Failing;

  if let Some(event) = event {
    tracing::warn!(%error, "subscription error");
    if !sink.deliver(SnapshotEvent::Error(event)).await {
      return false;
    }
  }
  !closed
}
