//! Building elements: reclaimable items surveyed on a demolition or
//! renovation site, grouped by the upload they arrived in.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  entity::{EntityFields, EntityKind, require_text, validate_coordinates},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildingElementFields {
  /// Identifies the survey upload this element was imported with.
  pub upload_uuid:         Uuid,
  pub reference:           String,
  pub title:               String,
  pub address:             String,
  pub latitude:            f64,
  pub longitude:           f64,
  /// Quantity expressed in the element's unit type.
  #[serde(default)]
  pub total:               Option<f64>,
  #[serde(default)]
  pub total_mass_kg:       Option<f64>,
  #[serde(default)]
  pub total_volume_m3:     Option<f64>,
  #[serde(default)]
  pub has_energy_recovery: Option<bool>,
  #[serde(default)]
  pub has_elimination:     Option<bool>,
}

impl EntityFields for BuildingElementFields {
  const KIND: EntityKind = EntityKind::BuildingElement;

  fn title(&self) -> &str { &self.title }

  fn validate(&self) -> Result<()> {
    require_text("title", &self.title)?;
    validate_coordinates(self.latitude, self.longitude)?;
    for (field, value) in [
      ("total", self.total),
      ("total_mass_kg", self.total_mass_kg),
      ("total_volume_m3", self.total_volume_m3),
    ] {
      if value.is_some_and(|v| v < 0.0) {
        return Err(Error::validation(format!("field `{field}` must not be negative")));
      }
    }
    Ok(())
  }
}
