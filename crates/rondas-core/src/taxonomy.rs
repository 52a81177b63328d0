//! The closed taxonomy catalog.
//!
//! Every taxonomy dimension is a variant of [`Dimension`]. The variant name
//! is the discriminator stored alongside each [`TypeEntry`], and the seed
//! labels declared here are what the store writes at schema initialisation.
//! Nothing else in the workspace enumerates taxonomy values.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

// ─── Dimension ───────────────────────────────────────────────────────────────

/// One taxonomy dimension. Serialised as its discriminator string, e.g.
/// `"WASTE_CODE"`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
  BuildingElementUnit,
  BuildingElementWorksheet,
  BuildingElementCategory,
  BuildingElementConstitution,
  Material,
  AuthorizedVehicle,
  CircularStrategy,
  WasteCode,
  CircularService,
  HealthStatus,
  ReusePotential,
  RecyclingPotential,
}

impl Dimension {
  /// The discriminator string stored in the `discriminator` column.
  pub fn discriminator(self) -> &'static str { self.into() }

  pub fn from_discriminator(s: &str) -> Option<Self> { s.parse().ok() }

  pub fn all() -> impl Iterator<Item = Self> { Self::iter() }

  /// Freeform dimensions have no seed; labels are created on first use.
  pub fn is_freeform(self) -> bool {
    matches!(self, Self::BuildingElementCategory | Self::BuildingElementConstitution)
  }

  /// A single-valued dimension admits at most one link per entity. The store
  /// enforces this with a partial unique index.
  pub fn is_single_valued(self) -> bool {
    matches!(
      self,
      Self::BuildingElementUnit
        | Self::BuildingElementWorksheet
        | Self::BuildingElementCategory
        | Self::HealthStatus
        | Self::ReusePotential
        | Self::RecyclingPotential
    )
  }

  /// Seed labels in id order; the entry at index `i` has id `i + 1`.
  pub fn seed(self) -> &'static [&'static str] {
    match self {
      Self::BuildingElementUnit => UNITS,
      Self::BuildingElementWorksheet => WORKSHEETS,
      Self::BuildingElementCategory | Self::BuildingElementConstitution => &[],
      Self::Material => MATERIALS,
      Self::AuthorizedVehicle => AUTHORIZED_VEHICLES,
      Self::CircularStrategy => CIRCULAR_STRATEGIES,
      Self::WasteCode => WASTE_CODES,
      Self::CircularService => CIRCULAR_SERVICES,
      Self::HealthStatus => HEALTH_STATUSES,
      Self::ReusePotential | Self::RecyclingPotential => POTENTIALS,
    }
  }

  /// Seed entries as `(id, label)` pairs.
  pub fn seed_entries(self) -> impl Iterator<Item = (i64, &'static str)> {
    self
      .seed()
      .iter()
      .enumerate()
      .map(|(i, label)| (i as i64 + 1, *label))
  }
}

impl std::fmt::Display for Dimension {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.discriminator())
  }
}

// ─── Type entries ────────────────────────────────────────────────────────────

/// One value within a dimension. `(discriminator, id)` is the identity;
/// `label` is unique within the discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeEntry {
  pub discriminator: Dimension,
  pub id:            i64,
  pub label:         String,
}

/// What to do when a label does not resolve to an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
  /// Reject the whole resolution with a validation error.
  Throw,
  /// Insert a new entry under the normalised label.
  Create,
}

/// Canonical form for freeform labels: trimmed and upper-cased.
pub fn normalize_label(label: &str) -> String { label.trim().to_uppercase() }

// ─── Seed data ───────────────────────────────────────────────────────────────

const UNITS: &[&str] = &["ml", "m²", "m³", "U", "ens", "kg"];

const WORKSHEETS: &[&str] = &[
  "STRUCTURE",
  "SECOND OEUVRE",
  "RESEAUX",
  "AMENAGEMENT EXT",
  "DECHETS RESIDUELS",
  "DEEE",
  "DEA",
];

const MATERIALS: &[&str] = &[
  "Inert",
  "Hazardous",
  "Concrete",
  "Wood",
  "Metals",
  "Plaster",
  "Rigid Plastics & PVC",
  "Glazed Windows",
  "Glass Wool",
  "Rock Wool",
  "Expanded Polystyrene (EPS)",
  "Polyurethane",
  "Bio-based Insulators",
  "Bituminous Membranes",
  "Non-PVC Floor Coverings",
  "PVC Floor Coverings",
  "Vintage",
  "Flat Glass",
  "Electrical and Electronic Equipment",
  "Furniture Components",
  "Unsorted",
];

const AUTHORIZED_VEHICLES: &[&str] = &[
  "Small Van (3 to 5 m³)",
  "Medium Van (6 to 12 m³)",
  "Flatbed Truck (Over 12 m³)",
];

const CIRCULAR_STRATEGIES: &[&str] = &[
  "Reuse",
  "Recycling",
  "Reparation",
  "Energy Valorization",
  "Disposal",
];

const WASTE_CODES: &[&str] = &[
  "02 01 03", "16 05 04*", "17 01 01", "17 01 02", "17 01 03", "17 01 06*",
  "17 01 07", "17 02 01", "17 02 02", "17 02 03", "17 02 04", "17 03 01",
  "17 03 02", "17 03 03", "17 04 01", "17 04 02", "17 04 03", "17 04 04",
  "17 04 05", "17 04 06", "17 04 07", "17 04 09", "17 04 10", "17 04 11",
  "17 05 03", "17 05 04", "17 05 05", "17 05 06", "17 05 07", "17 05 08",
  "17 06 01", "17 06 03", "17 06 04", "17 06 05", "17 08 01", "17 08 02",
  "17 09 01", "17 09 02", "17 09 03", "17 09 04", "20 01 36",
];

const CIRCULAR_SERVICES: &[&str] = &[
  "Demolition",
  "Cleaning",
  "Careful Removal",
  "Reparation",
  "Reclamation",
];

const HEALTH_STATUSES: &[&str] = &[
  "Asbestos",
  "Lead",
  "Termites",
  "Damaged",
  "Not Damaged",
  "Heterogeneous",
  "Unclear",
];

const POTENTIALS: &[&str] = &["IN SITU", "High", "Medium", "Low"];

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[test]
  fn discriminator_roundtrip() {
    for d in Dimension::all() {
      assert_eq!(Dimension::from_discriminator(d.discriminator()), Some(d));
    }
    assert_eq!(Dimension::WasteCode.discriminator(), "WASTE_CODE");
    assert_eq!(
      Dimension::BuildingElementWorksheet.discriminator(),
      "BUILDING_ELEMENT_WORKSHEET"
    );
    assert_eq!(Dimension::from_discriminator("NOPE"), None);
  }

  #[test]
  fn serde_uses_discriminator() {
    let json = serde_json::to_string(&Dimension::CircularStrategy).unwrap();
    assert_eq!(json, "\"CIRCULAR_STRATEGY\"");
  }

  #[test]
  fn seed_labels_unique_within_dimension() {
    for d in Dimension::all() {
      let labels: HashSet<_> = d.seed().iter().collect();
      assert_eq!(labels.len(), d.seed().len(), "duplicate seed label in {d}");
    }
  }

  #[test]
  fn freeform_dimensions_have_no_seed() {
    for d in Dimension::all().filter(|d| d.is_freeform()) {
      assert!(d.seed().is_empty());
    }
  }

  #[test]
  fn seed_ids_start_at_one() {
    let first = Dimension::WasteCode.seed_entries().next().unwrap();
    assert_eq!(first, (1, "02 01 03"));
    assert_eq!(Dimension::WasteCode.seed_entries().count(), 41);
    assert_eq!(Dimension::Material.seed_entries().count(), 21);
  }

  #[test]
  fn normalize_trims_and_uppercases() {
    assert_eq!(normalize_label("  porte bois "), "PORTE BOIS");
  }
}
