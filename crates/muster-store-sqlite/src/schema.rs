//! SQL schema for the Muster SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision so later migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
///
/// Incident documents are schemaless: everything except the id and the
/// ordering key lives in `fields_json`, an ordered JSON object using the
/// tagged encoding in [`crate::encode`].
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS incidents (
    id          TEXT PRIMARY KEY,
    date_added  TEXT NOT NULL,   -- ISO 8601 UTC, millisecond precision
    fields_json TEXT NOT NULL    -- ordered JSON object of document fields
);

CREATE INDEX IF NOT EXISTS incidents_date_added_idx
    ON incidents(date_added DESC, id ASC);

PRAGMA user_version = 1;
";

/// The one ordered query every snapshot is built from.
pub const SNAPSHOT_QUERY: &str =
  "SELECT id, fields_json FROM incidents ORDER BY date_added DESC, id ASC";
