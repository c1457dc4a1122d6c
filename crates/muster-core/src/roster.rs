//! The fixed roster: sub-regions and incident categories known at build time.
//!
//! Both enumerations render to, and parse from, the exact labels stored in
//! incident documents (`"Dutsin-Ma"`, `"Sick/Hospitalized"`, …). Parsing is
//! ASCII case-insensitive so PIN usernames and CLI flags are forgiving.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

// ─── Sub-regions ─────────────────────────────────────────────────────────────

/// An administrative area under the supervisory authority.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum SubRegion {
  Katsina,
  Daura,
  Funtua,
  Malumfashi,
  #[serde(rename = "Dutsin-Ma")]
  #[strum(serialize = "Dutsin-Ma")]
  DutsinMa,
  Kankia,
  Mani,
  Bakori,
  Kankara,
}

impl SubRegion {
  pub fn label(self) -> &'static str { self.into() }

  /// Every sub-region label, in declaration order.
  pub fn labels() -> Vec<&'static str> { Self::iter().map(Self::label).collect() }
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// The incident type. Determines which payload fields a record carries.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
  Absconded,
  #[serde(rename = "Sick/Hospitalized")]
  #[strum(serialize = "Sick/Hospitalized")]
  SickOrHospitalized,
  Kidnapped,
  Missing,
  Deceased,
}

impl Category {
  pub fn label(self) -> &'static str { self.into() }

  /// Every category label, in declaration order.
  pub fn labels() -> Vec<&'static str> { Self::iter().map(Self::label).collect() }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn roster_sizes() {
    assert_eq!(SubRegion::labels().len(), 9);
    assert_eq!(Category::labels().len(), 5);
  }

  #[test]
  fn labels_round_trip_through_parse() {
    for region in SubRegion::iter() {
      assert_eq!(SubRegion::from_str(region.label()).unwrap(), region);
    }
    for category in Category::iter() {
      assert_eq!(Category::from_str(category.label()).unwrap(), category);
    }
  }

  #[test]
  fn parse_is_case_insensitive() {
    assert_eq!(SubRegion::from_str("dutsin-ma").unwrap(), SubRegion::DutsinMa);
    assert_eq!(
      Category::from_str("sick/hospitalized").unwrap(),
      Category::SickOrHospitalized
    );
    assert!(SubRegion::from_str("Lagos").is_err());
  }

  #[test]
  fn serde_uses_display_labels() {
    let json = serde_json::to_string(&Category::SickOrHospitalized).unwrap();
    assert_eq!(json, "\"Sick/Hospitalized\"");
    let region: SubRegion = serde_json::from_str("\"Dutsin-Ma\"").unwrap();
    assert_eq!(region, SubRegion::DutsinMa);
  }
}
