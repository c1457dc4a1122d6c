//! Encoding and decoding between [`StoredValue`] documents and the JSON text
//! kept in the `fields_json` column.
//!
//! Plain JSON covers most shapes. Store-native values that JSON cannot carry
//! are written as single-key tagged objects:
//!
//! - timestamps: `{"$timestamp":{"seconds":…,"nanos":…}}`
//! - bytes: `{"$bytes":"<base64>"}`
//! - non-finite doubles: `{"$double":"NaN"}` (or `"inf"`, `"-inf"`)

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use muster_core::{
  record::{Document, RecordId},
  value::{StoredFields, StoredValue, Timestamp},
};
use serde_json::{Map, Value, json};

use crate::{Error, Result};

const TIMESTAMP_TAG: &str = "$timestamp";
const BYTES_TAG: &str = "$bytes";
const DOUBLE_TAG: &str = "$double";

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A row of the `incidents` table as read by the snapshot query.
#[derive(Debug)]
pub struct RawIncident {
  pub id:          String,
  pub fields_json: String,
}

impl RawIncident {
  /// Decode the row. A row whose fields cannot be decoded still yields a
  /// document carrying its id, so one bad row never hides the others.
  pub fn into_document(self) -> Document {
    let fields = decode_fields(&self.id, &self.fields_json).unwrap_or_else(|e| {
      tracing::warn!(id = %self.id, error = %e, "reading malformed incident as empty");
      StoredFields::new()
    });
    Document::from_stored(RecordId::new(self.id), &fields)
  }
}

// ─── Documents ───────────────────────────────────────────────────────────────

pub fn encode_fields(fields: &[(String, StoredValue)]) -> Result<String> {
  Ok(serde_json::to_string(&encode_map(fields))?)
}

/// Decode the stored `fields_json` of incident `id`. Anything but a JSON
/// object is [`Error::Malformed`].
pub fn decode_fields(id: &str, s: &str) -> Result<StoredFields> {
  let malformed = |reason: String| Error::Malformed { id: id.to_owned(), reason };
  match serde_json::from_str(s) {
    Ok(Value::Object(map)) => Ok(decode_map(map)),
    Ok(other) => Err(malformed(format!("expected an object, found {}", kind(&other)))),
    Err(e) => Err(malformed(e.to_string())),
  }
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

// ─── Values ──────────────────────────────────────────────────────────────────

fn encode_map(fields: &[(String, StoredValue)]) -> Value {
  Value::Object(
    fields
      .iter()
      .map(|(k, v)| (k.clone(), encode_value(v)))
      .collect(),
  )
}

pub fn encode_value(value: &StoredValue) -> Value {
  match value {
    StoredValue::Null => Value::Null,
    StoredValue::Bool(b) => Value::Bool(*b),
    StoredValue::Integer(i) => Value::from(*i),
    StoredValue::Double(d) => match serde_json::Number::from_f64(*d) {
      Some(n) => Value::Number(n),
      None => json!({ DOUBLE_TAG: non_finite_label(*d) }),
    },
    StoredValue::String(s) => Value::String(s.clone()),
    StoredValue::Timestamp(ts) => {
      json!({ TIMESTAMP_TAG: { "seconds": ts.seconds, "nanos": ts.nanos } })
    }
    StoredValue::Bytes(bytes) => json!({ BYTES_TAG: B64.encode(bytes) }),
    StoredValue::Array(items) => Value::Array(items.iter().map(encode_value).collect()),
    StoredValue::Map(fields) => encode_map(fields),
  }
}

fn non_finite_label(d: f64) -> &'static str {
  if d.is_nan() {
    "NaN"
  } else if d.is_sign_positive() {
    "inf"
  } else {
    "-inf"
  }
}

/// Total: every JSON value decodes to some [`StoredValue`]. A tagged object
/// whose payload is malformed is kept as an ordinary map.
pub fn decode_value(value: Value) -> StoredValue {
  match value {
    Value::Null => StoredValue::Null,
    Value::Bool(b) => StoredValue::Bool(b),
    Value::Number(n) => match n.as_i64() {
      Some(i) => StoredValue::Integer(i),
      None => StoredValue::Double(n.as_f64().unwrap_or(f64::NAN)),
    },
    Value::String(s) => StoredValue::String(s),
    Value::Array(items) => StoredValue::Array(items.into_iter().map(decode_value).collect()),
    Value::Object(map) => decode_tagged(&map).unwrap_or_else(|| StoredValue::Map(decode_map(map))),
  }
}

fn decode_map(map: Map<String, Value>) -> StoredFields {
  map.into_iter().map(|(k, v)| (k, decode_value(v))).collect()
}

fn decode_tagged(map: &Map<String, Value>) -> Option<StoredValue> {
  if map.len() != 1 {
    return None;
  }
  let (tag, payload) = map.iter().next()?;
  match tag.as_str() {
    TIMESTAMP_TAG => {
      let seconds = payload.get("seconds")?.as_i64()?;
      let nanos = u32::try_from(payload.get("nanos")?.as_u64()?).ok()?;
      Some(StoredValue::Timestamp(Timestamp { seconds, nanos }))
    }
    BYTES_TAG => B64.decode(payload.as_str()?).ok().map(StoredValue::Bytes),
    DOUBLE_TAG => match payload.as_str()? {
      "NaN" => Some(StoredValue::Double(f64::NAN)),
      "inf" => Some(StoredValue::Double(f64::INFINITY)),
      "-inf" => Some(StoredValue::Double(f64::NEG_INFINITY)),
      _ => None,
    },
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn native_values_survive_the_column() {
    let fields: StoredFields = vec![
      ("name".into(), "Amina".into()),
      ("count".into(), StoredValue::Integer(3)),
      ("ratio".into(), StoredValue::Double(0.5)),
      ("createdAt".into(), Timestamp { seconds: 1_700_000_000, nanos: 5 }.into()),
      ("photo".into(), StoredValue::Bytes(vec![1, 2, 3])),
      ("gone".into(), StoredValue::Null),
      ("nested".into(), StoredValue::Map(vec![("b".into(), true.into()), ("a".into(), "x".into())])),
    ];
    let text = encode_fields(&fields).unwrap();
    assert!(text.contains(r#""photo":{"$bytes":"AQID"}"#));
    assert_eq!(decode_fields("a", &text).unwrap(), fields);
  }

  #[test]
  fn non_finite_doubles_are_tagged() {
    let encoded = encode_value(&StoredValue::Double(f64::NEG_INFINITY));
    assert_eq!(encoded, json!({ "$double": "-inf" }));
    assert_eq!(
      decode_value(encoded),
      StoredValue::Double(f64::NEG_INFINITY)
    );
  }

  #[test]
  fn malformed_tags_stay_maps() {
    let value = json!({ "$timestamp": "yesterday" });
    assert!(matches!(decode_value(value), StoredValue::Map(_)));
  }

  #[test]
  fn non_object_documents_are_rejected() {
    let err = decode_fields("bad", "[1,2]").unwrap_err();
    assert_eq!(err.to_string(), "malformed incident bad: expected an object, found an array");
    assert!(matches!(decode_fields("bad", "{"), Err(Error::Malformed { .. })));
  }

  #[test]
  fn unreadable_rows_become_empty_documents() {
    let raw = RawIncident { id: "bad".into(), fields_json: "null".into() };
    let doc = raw.into_document();
    assert_eq!(doc.id, RecordId::new("bad"));
    assert!(doc.fields.is_empty());
  }
}
