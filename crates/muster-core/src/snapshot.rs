//! [`Snapshot`]: the complete, ordered record set as of one change.

use std::{collections::HashSet, sync::Arc};

use crate::record::{Document, IncidentRecord, RecordId};

/// The full ordered set of incident records delivered by one subscription
/// push. Snapshots replace each other wholesale; they are never patched.
///
/// Cloning is cheap; the records are shared.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  records: Arc<Vec<IncidentRecord>>,
}

impl Snapshot {
  /// Build a snapshot from documents already in delivery order.
  ///
  /// A document whose id was already seen is dropped, so ids are unique
  /// within a snapshot even if a store misbehaves.
  pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
    let mut seen = HashSet::new();
    let records = documents
      .into_iter()
      .filter(|doc| {
        let fresh = seen.insert(doc.id.clone());
        if !fresh {
          tracing::warn!(id = %doc.id, "dropping duplicate document in snapshot");
        }
        fresh
      })
      .map(IncidentRecord::from_document)
      .collect();
    Self { records: Arc::new(records) }
  }

  pub fn records(&self) -> &[IncidentRecord] { &self.records }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  pub fn get(&self, id: &RecordId) -> Option<&IncidentRecord> {
    self.records.iter().find(|r| &r.id == id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::value::PlainMap;

  #[test]
  fn duplicate_ids_are_dropped_keeping_order() {
    let doc = |id: &str| Document::new(RecordId::new(id), PlainMap::new());
    let snapshot = Snapshot::from_documents([doc("b"), doc("a"), doc("b")]);
    let ids: Vec<_> = snapshot.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["b", "a"]);
    assert!(snapshot.get(&RecordId::new("a")).is_some());
  }
}
