//! Stored values and the normalizer that turns them into plain values.
//!
//! A store hands documents to the core as [`StoredValue`]s, a small closed
//! set of shapes including store-native ones such as [`Timestamp`]. Nothing
//! store-native is allowed past the subscription boundary: every document is
//! run through [`normalize`] and the application only ever sees
//! [`PlainValue`]s (text, numbers, booleans, ordered maps and lists).

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer, ser::SerializeMap};

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// A store-native point in time: seconds and nanoseconds since the Unix epoch.
///
/// This is the explicit "convert to date" adapter: [`Timestamp::to_date`] can
/// fail for values outside the range `chrono` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
  pub seconds: i64,
  pub nanos:   u32,
}

impl Timestamp {
  pub fn now() -> Self { Self::from_datetime(Utc::now()) }

  pub fn from_datetime(dt: DateTime<Utc>) -> Self {
    Self {
      seconds: dt.timestamp(),
      nanos:   dt.timestamp_subsec_nanos(),
    }
  }

  /// Convert to a UTC date-time. `None` if out of range.
  pub fn to_date(&self) -> Option<DateTime<Utc>> {
    if self.nanos >= 1_000_000_000 {
      return None;
    }
    DateTime::from_timestamp(self.seconds, self.nanos)
  }
}

impl fmt::Display for Timestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Timestamp(seconds={}, nanoseconds={})", self.seconds, self.nanos)
  }
}

/// Canonical ISO-8601 rendering used for every date-time the core emits:
/// UTC, millisecond precision, `Z` suffix. Lexical order equals time order.
pub fn format_iso(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ─── Stored values ───────────────────────────────────────────────────────────

/// Ordered field list of a stored document.
pub type StoredFields = Vec<(String, StoredValue)>;

/// A field value as it comes out of the store, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
  Null,
  Bool(bool),
  Integer(i64),
  Double(f64),
  String(String),
  Timestamp(Timestamp),
  Bytes(Vec<u8>),
  Array(Vec<StoredValue>),
  /// A nested document; key order is significant and preserved.
  Map(StoredFields),
}

impl From<&str> for StoredValue {
  fn from(s: &str) -> Self { Self::String(s.to_owned()) }
}

impl From<String> for StoredValue {
  fn from(s: String) -> Self { Self::String(s) }
}

impl From<bool> for StoredValue {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<Timestamp> for StoredValue {
  fn from(ts: Timestamp) -> Self { Self::Timestamp(ts) }
}

/// Replace the value under `key`, or append it if absent.
pub fn set_field(fields: &mut StoredFields, key: &str, value: StoredValue) {
  match fields.iter_mut().find(|(k, _)| k == key) {
    Some((_, slot)) => *slot = value,
    None => fields.push((key.to_owned(), value)),
  }
}

// ─── Plain values ────────────────────────────────────────────────────────────

/// A JSON-safe value. There is deliberately no null variant.
#[derive(Debug, Clone, PartialEq)]
pub enum PlainValue {
  Text(String),
  Number(serde_json::Number),
  Bool(bool),
  List(Vec<PlainValue>),
  Map(PlainMap),
}

impl PlainValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Render scalars as text; collections render as an empty string.
  pub fn to_text(&self) -> String {
    match self {
      Self::Text(s) => s.clone(),
      Self::Number(n) => n.to_string(),
      Self::Bool(b) => b.to_string(),
      Self::List(_) | Self::Map(_) => String::new(),
    }
  }

  /// Interpret as a flag. Accepts booleans and the usual textual spellings.
  pub fn to_flag(&self) -> bool {
    match self {
      Self::Bool(b) => *b,
      Self::Text(s) => {
        matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
      }
      Self::Number(n) => n.as_i64().is_some_and(|n| n != 0),
      Self::List(_) | Self::Map(_) => false,
    }
  }
}

impl Serialize for PlainValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Text(s) => serializer.serialize_str(s),
      Self::Number(n) => n.serialize(serializer),
      Self::Bool(b) => serializer.serialize_bool(*b),
      Self::List(items) => items.serialize(serializer),
      Self::Map(map) => map.serialize(serializer),
    }
  }
}

/// Read a JSON value back into a plain value. `null` becomes `""`, matching
/// [`normalize`].
impl From<serde_json::Value> for PlainValue {
  fn from(value: serde_json::Value) -> Self {
    use serde_json::Value;
    match value {
      Value::Null => Self::Text(String::new()),
      Value::Bool(b) => Self::Bool(b),
      Value::Number(n) => Self::Number(n),
      Value::String(s) => Self::Text(s),
      Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
      Value::Object(map) => Self::Map(
        map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
      ),
    }
  }
}

/// An insertion-ordered string-keyed map of plain values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlainMap {
  entries: Vec<(String, PlainValue)>,
}

impl PlainMap {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, key: &str) -> Option<&PlainValue> {
    self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
  }

  /// Insert or replace. Replacing keeps the key's original position.
  pub fn insert(&mut self, key: impl Into<String>, value: PlainValue) {
    let key = key.into();
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some((_, slot)) => *slot = value,
      None => self.entries.push((key, value)),
    }
  }

  pub fn remove(&mut self, key: &str) -> Option<PlainValue> {
    let pos = self.entries.iter().position(|(k, _)| k == key)?;
    Some(self.entries.remove(pos).1)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(k, _)| k.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &PlainValue)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// Text rendering of `key`, or `""` when absent.
  pub fn text(&self, key: &str) -> String {
    self.get(key).map(PlainValue::to_text).unwrap_or_default()
  }
}

impl FromIterator<(String, PlainValue)> for PlainMap {
  fn from_iter<I: IntoIterator<Item = (String, PlainValue)>>(iter: I) -> Self {
    let mut map = Self::new();
    for (k, v) in iter {
      map.insert(k, v);
    }
    map
  }
}

impl Serialize for PlainMap {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.entries.len()))?;
    for (k, v) in &self.entries {
      map.serialize_entry(k, v)?;
    }
    map.end()
  }
}

// ─── Normalizer ──────────────────────────────────────────────────────────────

/// Convert a stored value into a plain value, depth-first. Total: never fails.
///
/// - `Null` → `""`
/// - `Timestamp` → ISO-8601 string, or its string form if out of range
/// - arrays and maps → element-wise / key-wise, order preserved
/// - booleans, integers, strings, finite doubles → unchanged
/// - anything else (bytes, non-finite doubles) → string coercion
pub fn normalize(value: &StoredValue) -> PlainValue {
  match value {
    StoredValue::Null => PlainValue::Text(String::new()),
    StoredValue::Bool(b) => PlainValue::Bool(*b),
    StoredValue::Integer(i) => PlainValue::Number((*i).into()),
    StoredValue::Double(d) => serde_json::Number::from_f64(*d)
      .map(PlainValue::Number)
      .unwrap_or_else(|| PlainValue::Text(d.to_string())),
    StoredValue::String(s) => PlainValue::Text(s.clone()),
    StoredValue::Timestamp(ts) => PlainValue::Text(match ts.to_date() {
      Some(dt) => format_iso(dt),
      None => ts.to_string(),
    }),
    StoredValue::Bytes(bytes) => {
      PlainValue::Text(format!("Bytes(base64={})", B64.encode(bytes)))
    }
    StoredValue::Array(items) => PlainValue::List(items.iter().map(normalize).collect()),
    StoredValue::Map(fields) => PlainValue::Map(normalize_fields(fields)),
  }
}

/// Normalize every field of a document, preserving field order.
pub fn normalize_fields(fields: &[(String, StoredValue)]) -> PlainMap {
  fields
    .iter()
    .map(|(k, v)| (k.clone(), normalize(v)))
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  /// Walks a plain value and checks it only holds the allowed shapes.
  fn assert_plain(value: &PlainValue) {
    match value {
      PlainValue::Text(_) | PlainValue::Number(_) | PlainValue::Bool(_) => {}
      PlainValue::List(items) => items.iter().for_each(assert_plain),
      PlainValue::Map(map) => map.iter().for_each(|(_, v)| assert_plain(v)),
    }
  }

  #[test]
  fn null_becomes_empty_string() {
    assert_eq!(normalize(&StoredValue::Null), PlainValue::Text(String::new()));
  }

  #[test]
  fn scalars_pass_through() {
    assert_eq!(normalize(&StoredValue::Bool(true)), PlainValue::Bool(true));
    assert_eq!(normalize(&StoredValue::Integer(7)), PlainValue::Number(7.into()));
    assert_eq!(normalize(&"illness".into()), PlainValue::Text("illness".into()));
    let PlainValue::Number(n) = normalize(&StoredValue::Double(1.5)) else {
      panic!("expected a number");
    };
    assert_eq!(n.as_f64(), Some(1.5));
  }

  #[test]
  fn timestamp_becomes_iso_string() {
    let dt = Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap();
    let value = StoredValue::Timestamp(Timestamp::from_datetime(dt));
    assert_eq!(normalize(&value), PlainValue::Text("2024-01-01T08:30:00.000Z".into()));
  }

  #[test]
  fn unconvertible_timestamp_falls_back_to_string_form() {
    let ts = Timestamp { seconds: i64::MAX, nanos: 0 };
    assert_eq!(
      normalize(&StoredValue::Timestamp(ts)),
      PlainValue::Text(format!("Timestamp(seconds={}, nanoseconds=0)", i64::MAX))
    );
    let ts = Timestamp { seconds: 0, nanos: 2_000_000_000 };
    assert!(matches!(normalize(&StoredValue::Timestamp(ts)), PlainValue::Text(_)));
  }

  #[test]
  fn non_finite_double_is_coerced() {
    assert_eq!(normalize(&StoredValue::Double(f64::NAN)), PlainValue::Text("NaN".into()));
  }

  #[test]
  fn bytes_are_coerced() {
    assert_eq!(
      normalize(&StoredValue::Bytes(vec![1, 2, 3])),
      PlainValue::Text("Bytes(base64=AQID)".into())
    );
  }

  #[test]
  fn nested_values_are_normalized_in_order() {
    let value = StoredValue::Map(vec![
      ("zeta".into(), StoredValue::Null),
      ("alpha".into(), StoredValue::Array(vec![
        StoredValue::Timestamp(Timestamp { seconds: 0, nanos: 0 }),
        StoredValue::Map(vec![("inner".into(), StoredValue::Null)]),
        StoredValue::Timestamp(Timestamp { seconds: i64::MIN, nanos: 0 }),
      ])),
      ("blob".into(), StoredValue::Bytes(vec![0xff])),
    ]);

    let plain = normalize(&value);
    assert_plain(&plain);

    let PlainValue::Map(map) = plain else { panic!("expected a map") };
    assert_eq!(map.keys().collect::<Vec<_>>(), ["zeta", "alpha", "blob"]);
    let Some(PlainValue::List(items)) = map.get("alpha") else {
      panic!("expected a list");
    };
    assert_eq!(items[0], PlainValue::Text("1970-01-01T00:00:00.000Z".into()));
    assert_eq!(items.len(), 3);
  }

  #[test]
  fn plain_map_serializes_in_insertion_order() {
    let map: PlainMap = [
      ("b".to_string(), PlainValue::Text("2".into())),
      ("a".to_string(), PlainValue::Bool(false)),
    ]
    .into_iter()
    .collect();
    assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"b":"2","a":false}"#);
  }

  #[test]
  fn json_null_reads_back_as_empty_text() {
    let plain = PlainValue::from(serde_json::json!({ "x": null, "y": [true] }));
    let PlainValue::Map(map) = plain else { panic!("expected a map") };
    assert_eq!(map.text("x"), "");
    assert_eq!(map.get("y"), Some(&PlainValue::List(vec![PlainValue::Bool(true)])));
  }

  #[test]
  fn flags_accept_text_spellings() {
    assert!(PlainValue::Text("Yes".into()).to_flag());
    assert!(PlainValue::Bool(true).to_flag());
    assert!(!PlainValue::Text("".into()).to_flag());
  }
}
