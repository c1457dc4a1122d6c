//! [`SqliteStore`]: the SQLite implementation of [`IncidentStore`].

use std::{fmt, path::Path, time::Duration};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio::sync::broadcast;

use muster_core::{
  Error as CoreError,
  record::{IncidentPatch, NewIncident, RecordId, field},
  snapshot::Snapshot,
  store::IncidentStore,
  subscription::Subscription,
  value::{StoredValue, Timestamp, format_iso, set_field},
};

use crate::{
  Error, Result,
  encode::{RawIncident, decode_fields, encode_fields},
  schema::{SCHEMA, SNAPSHOT_QUERY},
  watch,
};

/// How often subscriptions look for commits made by other connections.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ─── Store ───────────────────────────────────────────────────────────────────

/// The incident collection backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted and clones
/// share change notifications.
#[derive(Clone)]
pub struct SqliteStore {
  conn:          tokio_rusqlite::Connection,
  changes:       broadcast::Sender<()>,
  poll_interval: Duration,
}

impl fmt::Debug for SqliteStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SqliteStore")
      .field("poll_interval", &self.poll_interval)
      .finish_non_exhaustive()
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    let (changes, _) = broadcast::channel(64);
    Ok(Self { conn, changes, poll_interval: DEFAULT_POLL_INTERVAL })
  }

  /// Override how often subscriptions poll for other connections' commits.
  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }

  pub(crate) fn poll_interval(&self) -> Duration { self.poll_interval }

  pub(crate) fn changes(&self) -> broadcast::Receiver<()> { self.changes.subscribe() }

  /// Close the underlying connection. Every clone and live subscription of
  /// this store sees the connection as gone afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  fn notify(&self) {
    // No receivers simply means nobody is subscribed.
    let _ = self.changes.send(());
  }

  /// SQLite's change counter for commits made by *other* connections.
  pub(crate) async fn data_version(&self) -> Result<i64> {
    let version = self
      .conn
      .call(|conn| Ok(conn.query_row("PRAGMA data_version", [], |r| r.get(0))?))
      .await?;
    Ok(version)
  }

  /// Run the snapshot query. The change counter is read in the same call so
  /// the pair is consistent.
  pub(crate) async fn load_snapshot(&self) -> Result<(i64, Snapshot)> {
    let (version, raws): (i64, Vec<RawIncident>) = self
      .conn
      .call(|conn| {
        let version = conn.query_row("PRAGMA data_version", [], |r| r.get(0))?;
        let mut stmt = conn.prepare(SNAPSHOT_QUERY)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawIncident {
              id:          row.get(0)?,
              fields_json: row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((version, rows))
      })
      .await?;

    let documents = raws.into_iter().map(RawIncident::into_document);
    Ok((version, Snapshot::from_documents(documents)))
  }

  /// Insert a row verbatim, bypassing validation.
  #[cfg(test)]
  pub(crate) async fn insert_raw(
    &self,
    id: &str,
    date_added: &str,
    fields_json: &str,
  ) -> Result<()> {
    let row = (id.to_owned(), date_added.to_owned(), fields_json.to_owned());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO incidents (id, date_added, fields_json) VALUES (?1, ?2, ?3)",
          rusqlite::params![row.0, row.1, row.2],
        )?;
        Ok(())
      })
      .await?;
    self.notify();
    Ok(())
  }
}

// ─── IncidentStore impl ──────────────────────────────────────────────────────

impl IncidentStore for SqliteStore {
  type Error = Error;

  fn subscribe(&self) -> Subscription {
    match tokio::runtime::Handle::try_current() {
      Ok(runtime) => {
        let (subscription, sink) = Subscription::channel();
        runtime.spawn(watch::run(self.clone(), sink));
        subscription
      }
      Err(e) => Subscription::failed(CoreError::Connection(format!("no async runtime: {e}"))),
    }
  }

  async fn create(&self, input: NewIncident) -> Result<RecordId> {
    input.validate()?;
    let id = RecordId::generate();
    let date_added = input.date_added.unwrap_or_else(Utc::now);

    let mut fields = input.to_stored_fields(date_added)?;
    fields.push((field::CREATED_AT.to_owned(), Timestamp::now().into()));

    let id_str = id.to_string();
    let date_added_str = format_iso(date_added);
    let fields_json = encode_fields(&fields)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO incidents (id, date_added, fields_json) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, date_added_str, fields_json],
        )?;
        Ok(())
      })
      .await?;

    self.notify();
    Ok(id)
  }

  async fn update(&self, id: RecordId, patch: IncidentPatch) -> Result<()> {
    patch.validate()?;
    let id_str = id.to_string();

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let stored: Option<String> = tx
          .query_row(
            "SELECT fields_json FROM incidents WHERE id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(stored) = stored else {
          return Ok(false);
        };

        let mut fields = decode_fields(&id_str, &stored).map_err(other)?;
        patch.apply(&mut fields).map_err(other)?;
        set_field(&mut fields, field::UPDATED_AT, Timestamp::now().into());

        // Keep the ordering column in step with the document.
        let date_added = match fields.iter().find(|(k, _)| k == field::DATE_ADDED) {
          Some((_, StoredValue::String(s))) => Some(s.clone()),
          _ => None,
        };
        let fields_json = encode_fields(&fields).map_err(other)?;

        tx.execute(
          "UPDATE incidents
           SET date_added = COALESCE(?2, date_added), fields_json = ?3
           WHERE id = ?1",
          rusqlite::params![id_str, date_added, fields_json],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(Error::NotFound(id));
    }
    self.notify();
    Ok(())
  }

  async fn delete(&self, id: RecordId) -> Result<()> {
    let id_str = id.to_string();
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM incidents WHERE id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if removed > 0 {
      self.notify();
    }
    Ok(())
  }
}

/// Carry a non-SQLite failure out of a `call` closure.
fn other(e: impl Into<Error>) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e.into()))
}
