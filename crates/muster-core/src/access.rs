//! Who is asking: the supervisor or a regional officer bound to one
//! sub-region.

use serde::Serialize;

use crate::{record::IncidentRecord, roster::SubRegion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
  Supervisor,
  RegionalOfficer,
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
  pub role:       Role,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sub_region: Option<SubRegion>,
}

impl Principal {
  pub fn supervisor() -> Self { Self { role: Role::Supervisor, sub_region: None } }

  pub fn officer(sub_region: SubRegion) -> Self {
    Self { role: Role::RegionalOfficer, sub_region: Some(sub_region) }
  }

  pub fn is_supervisor(&self) -> bool { self.role == Role::Supervisor }

  /// Supervisors see every record; officers only their own sub-region's,
  /// as resolved by [`IncidentRecord::known_sub_region`].
  pub fn can_see(&self, record: &IncidentRecord) -> bool {
    match self.sub_region {
      _ if self.is_supervisor() => true,
      Some(region) => record.known_sub_region() == Some(region),
      None => false,
    }
  }

  /// Whether this principal may file an incident in `region`.
  pub fn can_write_region(&self, region: SubRegion) -> bool {
    self.is_supervisor() || self.sub_region == Some(region)
  }

  /// The records visible to this principal, order preserved.
  pub fn scope<'a>(
    &self,
    records: impl IntoIterator<Item = &'a IncidentRecord>,
  ) -> Vec<&'a IncidentRecord> {
    records.into_iter().filter(|r| self.can_see(r)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    record::{Document, RecordId},
    value::{PlainMap, PlainValue},
  };

  fn record(id: &str, region: &str) -> IncidentRecord {
    let fields: PlainMap =
      [("subRegion".to_owned(), PlainValue::Text(region.into()))].into_iter().collect();
    IncidentRecord::from_document(Document::new(RecordId::new(id), fields))
  }

  #[test]
  fn officers_only_see_their_sub_region() {
    let records = [record("1", "Daura"), record("2", "Mani"), record("3", "Daura")];
    let officer = Principal::officer(SubRegion::Daura);
    let ids: Vec<_> = officer.scope(&records).iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["1", "3"]);
    assert_eq!(Principal::supervisor().scope(&records).len(), 3);
  }

  #[test]
  fn visibility_and_roster_agree_on_label_case() {
    let records = [record("1", "daura"), record("2", "Daura")];
    assert_eq!(records[0].known_sub_region(), None);
    assert_eq!(records[1].known_sub_region(), Some(SubRegion::Daura));

    let officer = Principal::officer(SubRegion::Daura);
    let ids: Vec<_> = officer.scope(&records).iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["2"]);
  }

  #[test]
  fn officers_write_only_their_sub_region() {
    let officer = Principal::officer(SubRegion::Mani);
    assert!(officer.can_write_region(SubRegion::Mani));
    assert!(!officer.can_write_region(SubRegion::Daura));
    assert!(Principal::supervisor().can_write_region(SubRegion::Daura));
  }
}
