//! The aggregation engine: per-sub-region and per-category tallies over a
//! snapshot.
//!
//! Aggregation is a pure function of the records it is given and is always
//! recomputed in full. Every known sub-region and category gets a bucket even
//! when its count is zero; raw values outside the roster get a bucket of their
//! own so every record is counted exactly once in each tally.

use std::fmt::Write as _;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
  record::IncidentRecord,
  roster::{Category, SubRegion},
};

/// An ordered `label -> count` table. Serialises as a JSON object in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally(Vec<(String, usize)>);

impl Tally {
  /// A table with a zero bucket for each label, in the given order.
  fn zeroed<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
    Self(labels.into_iter().map(|l| (l.to_owned(), 0)).collect())
  }

  fn bump(&mut self, label: &str) {
    match self.0.iter_mut().find(|(l, _)| l == label) {
      Some((_, count)) => *count += 1,
      None => self.0.push((label.to_owned(), 1)),
    }
  }

  /// The count for `label`, or `None` if it has no bucket.
  pub fn get(&self, label: &str) -> Option<usize> {
    self.0.iter().find(|(l, _)| l == label).map(|(_, c)| *c)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
    self.0.iter().map(|(l, c)| (l.as_str(), *c))
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Sum of every bucket.
  pub fn sum(&self) -> usize { self.0.iter().map(|(_, c)| c).sum() }
}

impl Serialize for Tally {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.0.len()))?;
    for (label, count) in &self.0 {
      map.serialize_entry(label, count)?;
    }
    map.end()
  }
}

/// Aggregated counts over one snapshot (or a scoped subset of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
  pub per_sub_region: Tally,
  pub per_category:   Tally,
  pub total:          usize,
}

/// Tally `records` by their literal stored sub-region and category.
///
/// Known labels come first in the order given, zero-filled; unknown raw
/// values follow in first-seen order.
pub fn aggregate<'a, R>(records: R, sub_regions: &[&str], categories: &[&str]) -> Stats
where
  R: IntoIterator<Item = &'a IncidentRecord>,
{
  let mut per_sub_region = Tally::zeroed(sub_regions.iter().copied());
  let mut per_category = Tally::zeroed(categories.iter().copied());
  let mut total = 0;
  for record in records {
    per_sub_region.bump(&record.sub_region);
    per_category.bump(record.category_label());
    total += 1;
  }
  Stats { per_sub_region, per_category, total }
}

impl Stats {
  /// Aggregate against the built-in roster.
  pub fn for_roster<'a, R>(records: R) -> Self
  where
    R: IntoIterator<Item = &'a IncidentRecord>,
  {
    aggregate(records, &SubRegion::labels(), &Category::labels())
  }

  /// The plain-text tally handed to the summarizer as context.
  pub fn summary_lines(&self) -> String {
    let mut out = format!("Total incidents: {}\n", self.total);
    out.push_str("By sub-region:\n");
    for (label, count) in self.per_sub_region.iter() {
      let _ = writeln!(out, "- {}: {count}", display_label(label));
    }
    out.push_str("By category:\n");
    for (label, count) in self.per_category.iter() {
      let _ = writeln!(out, "- {}: {count}", display_label(label));
    }
    out
  }
}

fn display_label(label: &str) -> &str {
  if label.is_empty() { "(unspecified)" } else { label }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    record::{Document, RecordId},
    value::{PlainMap, PlainValue},
  };

  fn record(id: &str, region: &str, category: &str) -> IncidentRecord {
    let fields: PlainMap = [
      ("subRegion".to_owned(), PlainValue::Text(region.into())),
      ("category".to_owned(), PlainValue::Text(category.into())),
    ]
    .into_iter()
    .collect();
    IncidentRecord::from_document(Document::new(RecordId::new(id), fields))
  }

  #[test]
  fn empty_snapshot_is_zero_filled() {
    let stats = Stats::for_roster(std::iter::empty());
    assert_eq!(stats.total, 0);
    assert_eq!(stats.per_sub_region.len(), 9);
    assert_eq!(stats.per_category.len(), 5);
    assert!(stats.per_sub_region.iter().all(|(_, c)| c == 0));
    assert_eq!(stats.per_sub_region.iter().next(), Some(("Katsina", 0)));
    assert_eq!(stats.per_category.get("Sick/Hospitalized"), Some(0));
  }

  #[test]
  fn counts_partition_the_snapshot() {
    let records = [
      record("1", "Daura", "Missing"),
      record("2", "Daura", "Deceased"),
      record("3", "Mani", "Missing"),
    ];
    let stats = Stats::for_roster(&records);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.per_sub_region.get("Daura"), Some(2));
    assert_eq!(stats.per_sub_region.get("Mani"), Some(1));
    assert_eq!(stats.per_category.get("Missing"), Some(2));
    assert_eq!(stats.per_sub_region.sum(), stats.total);
    assert_eq!(stats.per_category.sum(), stats.total);
  }

  #[test]
  fn unknown_values_get_their_own_bucket() {
    let records = [
      record("1", "Lagos", "Transferred"),
      record("2", "Daura", "Missing"),
      record("3", "Lagos", "Promoted"),
    ];
    let stats = Stats::for_roster(&records);
    assert_eq!(stats.per_sub_region.len(), 10);
    assert_eq!(stats.per_sub_region.get("Lagos"), Some(2));
    let extra: Vec<_> = stats.per_category.iter().skip(5).map(|(l, _)| l).collect();
    assert_eq!(extra, ["Transferred", "Promoted"]);
    assert_eq!(stats.per_category.sum(), 3);
  }

  #[test]
  fn serialises_in_roster_order() {
    let stats = aggregate(&[record("1", "B", "x")], &["A", "B"], &["x"]);
    let json = serde_json::to_string(&stats).unwrap();
    assert_eq!(
      json,
      r#"{"perSubRegion":{"A":0,"B":1},"perCategory":{"x":1},"total":1}"#
    );
  }

  #[test]
  fn summary_lines_list_every_bucket() {
    let stats = aggregate(&[record("1", "", "x")], &["A"], &["x"]);
    let text = stats.summary_lines();
    assert!(text.starts_with("Total incidents: 1\n"));
    assert!(text.contains("- A: 0\n"));
    assert!(text.contains("- (unspecified): 1\n"));
  }
}
