//! Client-side search over the held snapshot.

use crate::record::IncidentRecord;

/// The records whose name, state code or sub-region contains `query`,
/// ignoring case. Order is preserved. Only the empty query matches
/// everything; whitespace is part of the search text.
pub fn filter<'a, I>(records: I, query: &str) -> Vec<&'a IncidentRecord>
where
  I: IntoIterator<Item = &'a IncidentRecord>,
{
  let needle = query.to_lowercase();
  if needle.is_empty() {
    return records.into_iter().collect();
  }
  records.into_iter().filter(|r| matches(r, &needle)).collect()
}

/// `needle` must already be lowercased.
pub fn matches(record: &IncidentRecord, needle: &str) -> bool {
  [&record.name, &record.state_code, &record.sub_region]
    .into_iter()
    .any(|text| text.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    record::{Document, RecordId},
    value::{PlainMap, PlainValue},
  };

  fn record(id: &str, name: &str, code: &str, region: &str) -> IncidentRecord {
    let fields: PlainMap = [
      ("name".to_owned(), PlainValue::Text(name.into())),
      ("stateCode".to_owned(), PlainValue::Text(code.into())),
      ("subRegion".to_owned(), PlainValue::Text(region.into())),
      ("category".to_owned(), PlainValue::Text("Missing".into())),
    ]
    .into_iter()
    .collect();
    IncidentRecord::from_document(Document::new(RecordId::new(id), fields))
  }

  fn ids(records: Vec<&IncidentRecord>) -> Vec<&str> {
    records.into_iter().map(|r| r.id.as_str()).collect()
  }

  #[test]
  fn state_code_match_ignores_case_and_keeps_order() {
    let records = [
      record("1", "Amina", "KT/24A/0001", "Daura"),
      record("2", "Musa", "LA/23B/1111", "Mani"),
      record("3", "Sani", "kt/24c/0420", "Funtua"),
    ];
    assert_eq!(ids(filter(&records, "kt/24")), ["1", "3"]);
  }

  #[test]
  fn matches_name_and_sub_region() {
    let records = [
      record("1", "Amina Bello", "A", "Daura"),
      record("2", "Musa", "B", "Dutsin-Ma"),
    ];
    assert_eq!(ids(filter(&records, "BELLO")), ["1"]);
    assert_eq!(ids(filter(&records, "dutsin")), ["2"]);
    assert!(filter(&records, "zzz").is_empty());
  }

  #[test]
  fn blank_query_matches_everything() {
    let records = [record("1", "A", "B", "C"), record("2", "D", "E", "F")];
    assert_eq!(ids(filter(&records, "")), ["1", "2"]);
  }

  #[test]
  fn whitespace_is_matched_literally() {
    let records = [record("1", "Amina", "A", "Daura"), record("2", "Amina Bello", "B", "Mani")];
    assert_eq!(ids(filter(&records, "Amina ")), ["2"]);
    assert!(filter(&records, "   ").is_empty());
  }

  #[test]
  fn category_is_not_searched() {
    let records = [record("1", "A", "B", "C")];
    assert!(filter(&records, "missing").is_empty());
  }
}
