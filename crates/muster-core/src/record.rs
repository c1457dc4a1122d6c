//! Incident records, the unit of synchronized state.
//!
//! On the read side a record starts life as a [`Document`]: a store-assigned
//! id plus normalized fields. [`IncidentRecord::from_document`] derives the
//! typed view the rest of the core works with, including the
//! category-discriminated [`Incident`] payload.
//!
//! On the write side callers build a [`NewIncident`] (or an
//! [`IncidentPatch`]) and hand it to a store through [`crate::mutate`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::{
  Error, Result,
  roster::{Category, SubRegion},
  value::{PlainMap, PlainValue, StoredFields, StoredValue, format_iso, set_field},
};

/// Wire names of the fields every incident document carries.
pub mod field {
  pub const ID: &str = "id";
  pub const NAME: &str = "name";
  pub const STATE_CODE: &str = "stateCode";
  pub const SUB_REGION: &str = "subRegion";
  pub const CATEGORY: &str = "category";
  pub const DATE_ADDED: &str = "dateAdded";
  pub const CREATED_AT: &str = "createdAt";
  pub const UPDATED_AT: &str = "updatedAt";

  pub const PERIOD_OF_ABSENCE: &str = "periodOfAbsence";
  pub const ILLNESS: &str = "illness";
  pub const HOSPITALIZED: &str = "hospitalized";
  pub const DATE_OF_INCIDENT: &str = "dateOfIncident";
  pub const DATE_OF_DEATH: &str = "dateOfDeath";
  pub const REASON: &str = "reason";

  /// Every category-specific payload key.
  pub const PAYLOAD: [&str; 6] = [
    PERIOD_OF_ABSENCE,
    ILLNESS,
    HOSPITALIZED,
    DATE_OF_INCIDENT,
    DATE_OF_DEATH,
    REASON,
  ];
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque, store-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  /// A fresh random identifier, for stores that assign ids client-side.
  pub fn generate() -> Self { Self(Uuid::new_v4().to_string()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for RecordId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A stored document after normalization: id first, then its fields.
///
/// A stored field literally named `id` is dropped so it can never shadow the
/// document id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
  pub id:     RecordId,
  pub fields: PlainMap,
}

impl Document {
  pub fn new(id: RecordId, mut fields: PlainMap) -> Self {
    fields.remove(field::ID);
    Self { id, fields }
  }

  /// Normalize raw stored fields into a document.
  pub fn from_stored(id: RecordId, fields: &[(String, StoredValue)]) -> Self {
    Self::new(id, crate::value::normalize_fields(fields))
  }

  /// Rebuild a document from its JSON wire form (as served by the API).
  /// Returns `None` if `value` is not an object with a non-empty string `id`.
  pub fn from_json(value: serde_json::Value) -> Option<Self> {
    let serde_json::Value::Object(mut map) = value else {
      return None;
    };
    let id = match map.shift_remove(field::ID)? {
      serde_json::Value::String(id) if !id.is_empty() => RecordId(id),
      _ => return None,
    };
    let fields = map
      .into_iter()
      .map(|(k, v)| (k, PlainValue::from(v)))
      .collect();
    Some(Self::new(id, fields))
  }
}

// ─── Incident payload ────────────────────────────────────────────────────────

/// The category-specific payload. The variant *is* the category, so a record
/// can never carry fields belonging to a different category.
///
/// Serialises with an internal `category` tag using the stored labels, e.g.
/// `{"category":"Deceased","dateOfDeath":"…","reason":"…"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum Incident {
  #[serde(rename_all = "camelCase")]
  Absconded { period_of_absence: String },

  #[serde(rename = "Sick/Hospitalized", rename_all = "camelCase")]
  SickOrHospitalized {
    illness:      String,
    #[serde(default)]
    hospitalized: bool,
  },

  #[serde(rename_all = "camelCase")]
  Kidnapped { date_of_incident: String },

  #[serde(rename_all = "camelCase")]
  Missing { date_of_incident: String },

  #[serde(rename_all = "camelCase")]
  Deceased { date_of_death: String, reason: String },

  /// A stored category outside the known roster. Read side only.
  #[serde(skip)]
  Unrecognized { category: String },
}

impl Incident {
  /// The known category, or `None` for [`Incident::Unrecognized`].
  pub fn category(&self) -> Option<Category> {
    match self {
      Self::Absconded { .. } => Some(Category::Absconded),
      Self::SickOrHospitalized { .. } => Some(Category::SickOrHospitalized),
      Self::Kidnapped { .. } => Some(Category::Kidnapped),
      Self::Missing { .. } => Some(Category::Missing),
      Self::Deceased { .. } => Some(Category::Deceased),
      Self::Unrecognized { .. } => None,
    }
  }

  /// The literal category label as stored.
  pub fn category_label(&self) -> &str {
    match self {
      Self::Unrecognized { category } => category,
      known => known.category().map(Category::label).unwrap_or_default(),
    }
  }

  /// Decode the payload for `category` out of normalized fields. Missing
  /// payload fields read as empty; an unknown category is kept verbatim.
  pub fn from_fields(category: &str, fields: &PlainMap) -> Self {
    let flag = |key| fields.get(key).is_some_and(PlainValue::to_flag);
    // Stored labels are matched exactly; near-misses count as unrecognized.
    let known = Category::iter().find(|c| c.label() == category);
    match known {
      Some(Category::Absconded) => Self::Absconded {
        period_of_absence: fields.text(field::PERIOD_OF_ABSENCE),
      },
      Some(Category::SickOrHospitalized) => Self::SickOrHospitalized {
        illness:      fields.text(field::ILLNESS),
        hospitalized: flag(field::HOSPITALIZED),
      },
      Some(Category::Kidnapped) => Self::Kidnapped {
        date_of_incident: fields.text(field::DATE_OF_INCIDENT),
      },
      Some(Category::Missing) => Self::Missing {
        date_of_incident: fields.text(field::DATE_OF_INCIDENT),
      },
      Some(Category::Deceased) => Self::Deceased {
        date_of_death: fields.text(field::DATE_OF_DEATH),
        reason:        fields.text(field::REASON),
      },
      None => Self::Unrecognized { category: category.to_owned() },
    }
  }

  /// Stored fields for this payload: the category label followed by exactly
  /// the keys its variant owns.
  pub fn to_stored_fields(&self) -> Result<StoredFields> {
    let category = self.category().ok_or_else(|| {
      Error::InvalidRecord(format!("unknown category {:?}", self.category_label()))
    })?;
    let mut fields: StoredFields =
      vec![(field::CATEGORY.to_owned(), category.label().into())];
    let mut push = |key: &str, value: StoredValue| fields.push((key.to_owned(), value));
    match self {
      Self::Absconded { period_of_absence } => {
        push(field::PERIOD_OF_ABSENCE, period_of_absence.as_str().into());
      }
      Self::SickOrHospitalized { illness, hospitalized } => {
        push(field::ILLNESS, illness.as_str().into());
        push(field::HOSPITALIZED, (*hospitalized).into());
      }
      Self::Kidnapped { date_of_incident } | Self::Missing { date_of_incident } => {
        push(field::DATE_OF_INCIDENT, date_of_incident.as_str().into());
      }
      Self::Deceased { date_of_death, reason } => {
        push(field::DATE_OF_DEATH, date_of_death.as_str().into());
        push(field::REASON, reason.as_str().into());
      }
      Self::Unrecognized { .. } => {}
    }
    Ok(fields)
  }
}

// ─── IncidentRecord ──────────────────────────────────────────────────────────

/// The typed view of one incident document.
///
/// `fields` retains the full normalized document (including audit fields
/// such as `createdAt`); serialising a record reproduces that document with
/// `id` first.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
  pub id:         RecordId,
  pub name:       String,
  pub state_code: String,
  /// The literal stored sub-region; may lie outside the known roster.
  pub sub_region: String,
  /// ISO-8601 ordering key.
  pub date_added: String,
  pub incident:   Incident,
  pub fields:     PlainMap,
}

impl IncidentRecord {
  pub fn from_document(doc: Document) -> Self {
    let fields = doc.fields;
    Self {
      id:         doc.id,
      name:       fields.text(field::NAME),
      state_code: fields.text(field::STATE_CODE),
      sub_region: fields.text(field::SUB_REGION),
      date_added: fields.text(field::DATE_ADDED),
      incident:   Incident::from_fields(&fields.text(field::CATEGORY), &fields),
      fields,
    }
  }

  /// The literal stored category label.
  pub fn category_label(&self) -> &str { self.incident.category_label() }

  /// The sub-region, if the stored label is exactly one of the roster's.
  pub fn known_sub_region(&self) -> Option<SubRegion> {
    SubRegion::iter().find(|r| r.label() == self.sub_region)
  }
}

impl Serialize for IncidentRecord {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
    map.serialize_entry(field::ID, &self.id)?;
    for (k, v) in self.fields.iter() {
      map.serialize_entry(k, v)?;
    }
    map.end()
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Input to [`crate::mutate::create`].
///
/// The JSON form mirrors a stored document:
/// `{"name":…,"stateCode":…,"subRegion":…,"category":…,<payload>,"dateAdded"?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
  pub name:       String,
  pub state_code: String,
  pub sub_region: SubRegion,
  #[serde(flatten)]
  pub incident:   Incident,
  /// Caller-supplied ordering key; the mutator fills in "now" when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date_added: Option<DateTime<Utc>>,
}

impl NewIncident {
  pub fn new(
    name: impl Into<String>,
    state_code: impl Into<String>,
    sub_region: SubRegion,
    incident: Incident,
  ) -> Self {
    Self {
      name: name.into(),
      state_code: state_code.into(),
      sub_region,
      incident,
      date_added: None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::InvalidRecord("name is required".into()));
    }
    if self.state_code.trim().is_empty() {
      return Err(Error::InvalidRecord("state code is required".into()));
    }
    if self.incident.category().is_none() {
      return Err(Error::InvalidRecord(format!(
        "unknown category {:?}",
        self.incident.category_label()
      )));
    }
    Ok(())
  }

  /// The ordered stored fields for this incident. Audit fields are the
  /// store's business and are not included.
  pub fn to_stored_fields(&self, date_added: DateTime<Utc>) -> Result<StoredFields> {
    let mut fields: StoredFields = vec![
      (field::NAME.to_owned(), self.name.trim().into()),
      (field::STATE_CODE.to_owned(), self.state_code.trim().into()),
      (field::SUB_REGION.to_owned(), self.sub_region.label().into()),
    ];
    fields.extend(self.incident.to_stored_fields()?);
    fields.push((field::DATE_ADDED.to_owned(), format_iso(date_added).into()));
    Ok(fields)
  }
}

/// Input to [`crate::mutate::update`]: fields to merge into an existing
/// record. Absent fields are left untouched.
///
/// Replacing `incident` removes every payload key of the previous category,
/// so the stored document keeps exactly one valid shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub state_code: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sub_region: Option<SubRegion>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub incident:   Option<Incident>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date_added: Option<DateTime<Utc>>,
}

impl IncidentPatch {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  pub fn validate(&self) -> Result<()> {
    if self.is_empty() {
      return Err(Error::InvalidRecord("patch has no fields".into()));
    }
    if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
      return Err(Error::InvalidRecord("name cannot be blank".into()));
    }
    if self.state_code.as_deref().is_some_and(|c| c.trim().is_empty()) {
      return Err(Error::InvalidRecord("state code cannot be blank".into()));
    }
    if let Some(incident) = &self.incident {
      incident.to_stored_fields()?;
    }
    Ok(())
  }

  /// Merge this patch into a stored document's fields.
  pub fn apply(&self, fields: &mut StoredFields) -> Result<()> {
    if let Some(name) = &self.name {
      set_field(fields, field::NAME, name.trim().into());
    }
    if let Some(code) = &self.state_code {
      set_field(fields, field::STATE_CODE, code.trim().into());
    }
    if let Some(region) = self.sub_region {
      set_field(fields, field::SUB_REGION, region.label().into());
    }
    if let Some(incident) = &self.incident {
      fields.retain(|(k, _)| !field::PAYLOAD.contains(&k.as_str()));
      for (k, v) in incident.to_stored_fields()? {
        set_field(fields, &k, v);
      }
    }
    if let Some(date_added) = self.date_added {
      set_field(fields, field::DATE_ADDED, format_iso(date_added).into());
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::value::{Timestamp, normalize_fields};

  fn deceased() -> Incident {
    Incident::Deceased {
      date_of_death: "2024-01-01".into(),
      reason:        "illness".into(),
    }
  }

  #[test]
  fn new_incident_json_is_flat() {
    let input = NewIncident::new("Amina Bello", "KT/24A/0001", SubRegion::Daura, deceased());
    let json = serde_json::to_value(&input).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "name": "Amina Bello",
        "stateCode": "KT/24A/0001",
        "subRegion": "Daura",
        "category": "Deceased",
        "dateOfDeath": "2024-01-01",
        "reason": "illness",
      })
    );
  }

  #[test]
  fn new_incident_parses_sick_payload() {
    let input: NewIncident = serde_json::from_value(serde_json::json!({
      "name": "Musa",
      "stateCode": "KT/24B/0420",
      "subRegion": "Dutsin-Ma",
      "category": "Sick/Hospitalized",
      "illness": "malaria",
      "hospitalized": true,
    }))
    .unwrap();
    assert_eq!(input.sub_region, SubRegion::DutsinMa);
    assert_eq!(input.incident, Incident::SickOrHospitalized {
      illness:      "malaria".into(),
      hospitalized: true,
    });
  }

  #[test]
  fn new_incident_rejects_unknown_category() {
    let parsed = serde_json::from_value::<NewIncident>(serde_json::json!({
      "name": "Musa",
      "stateCode": "KT/24B/0420",
      "subRegion": "Daura",
      "category": "Promoted",
    }));
    assert!(parsed.is_err());
  }

  #[test]
  fn validate_requires_identity_fields() {
    let input = NewIncident::new("  ", "KT/1", SubRegion::Mani, deceased());
    assert!(matches!(input.validate(), Err(Error::InvalidRecord(_))));

    let unknown = NewIncident::new(
      "A",
      "KT/1",
      SubRegion::Mani,
      Incident::Unrecognized { category: "Other".into() },
    );
    assert!(matches!(unknown.validate(), Err(Error::InvalidRecord(_))));
  }

  #[test]
  fn stored_fields_carry_exactly_the_payload_of_the_category() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let input = NewIncident::new("A", "KT/1", SubRegion::Mani, deceased());
    let fields = input.to_stored_fields(at).unwrap();
    let keys: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, [
      "name",
      "stateCode",
      "subRegion",
      "category",
      "dateOfDeath",
      "reason",
      "dateAdded"
    ]);
    assert_eq!(fields[6].1, StoredValue::String("2024-03-01T12:00:00.000Z".into()));
  }

  #[test]
  fn record_from_document_reads_typed_view() {
    let stored: StoredFields = vec![
      ("id".into(), "shadow".into()),
      ("name".into(), "Amina".into()),
      ("stateCode".into(), "KT/24A/0001".into()),
      ("subRegion".into(), "Funtua".into()),
      ("category".into(), "Deceased".into()),
      ("dateOfDeath".into(), "2024-01-01".into()),
      ("reason".into(), StoredValue::Null),
      ("dateAdded".into(), "2024-02-01T00:00:00.000Z".into()),
      ("createdAt".into(), StoredValue::Timestamp(Timestamp { seconds: 0, nanos: 0 })),
    ];
    let doc = Document::from_stored(RecordId::new("abc"), &stored);
    let record = IncidentRecord::from_document(doc);

    assert_eq!(record.id.as_str(), "abc");
    assert_eq!(record.known_sub_region(), Some(SubRegion::Funtua));
    assert_eq!(record.incident, Incident::Deceased {
      date_of_death: "2024-01-01".into(),
      reason:        String::new(),
    });
    assert_eq!(record.fields.text("createdAt"), "1970-01-01T00:00:00.000Z");

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["id"], "abc");
    let first_key = json.as_object().unwrap().keys().next().unwrap().clone();
    assert_eq!(first_key, "id");
  }

  #[test]
  fn unknown_category_is_kept_verbatim() {
    let fields = normalize_fields(&[("category".into(), "Transferred".into())]);
    let incident = Incident::from_fields("Transferred", &fields);
    assert_eq!(incident.category_label(), "Transferred");
    assert_eq!(incident.category(), None);
  }

  #[test]
  fn document_round_trips_through_json() {
    let doc = Document::from_json(serde_json::json!({
      "id": "r1",
      "name": "Amina",
      "category": "Missing",
      "dateOfIncident": null,
    }))
    .unwrap();
    let record = IncidentRecord::from_document(doc);
    assert_eq!(record.incident, Incident::Missing { date_of_incident: String::new() });
    assert!(Document::from_json(serde_json::json!({ "id": "" })).is_none());
    assert!(Document::from_json(serde_json::json!([1, 2])).is_none());
  }

  #[test]
  fn patch_replacing_incident_drops_previous_payload() {
    let mut fields: StoredFields = vec![
      ("name".into(), "Amina".into()),
      ("category".into(), "Sick/Hospitalized".into()),
      ("illness".into(), "malaria".into()),
      ("hospitalized".into(), true.into()),
      ("dateAdded".into(), "2024-02-01T00:00:00.000Z".into()),
    ];
    let patch = IncidentPatch {
      name: Some("Amina Bello".into()),
      incident: Some(deceased()),
      ..IncidentPatch::default()
    };
    patch.validate().unwrap();
    patch.apply(&mut fields).unwrap();

    let keys: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["name", "category", "dateAdded", "dateOfDeath", "reason"]);
    assert_eq!(fields[0].1, StoredValue::String("Amina Bello".into()));
    assert_eq!(fields[1].1, StoredValue::String("Deceased".into()));
  }

  #[test]
  fn empty_patch_is_invalid() {
    assert!(matches!(
      IncidentPatch::default().validate(),
      Err(Error::InvalidRecord(_))
    ));
  }
}
