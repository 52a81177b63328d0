//! Stakeholders: collectors that take materials back, and contractors that
//! offer circular services on site.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  entity::{EntityFields, EntityKind, require_text, validate_coordinates},
};

/// A waste or material collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorFields {
  pub name:      String,
  pub address:   String,
  pub zip_code:  String,
  pub city:      String,
  pub latitude:  f64,
  pub longitude: f64,
  #[serde(default)]
  pub email:     Option<String>,
  #[serde(default)]
  pub phone:     Option<String>,
}

impl EntityFields for CollectorFields {
  const KIND: EntityKind = EntityKind::Collector;

  fn title(&self) -> &str { &self.name }

  fn validate(&self) -> Result<()> {
    require_text("name", &self.name)?;
    validate_coordinates(self.latitude, self.longitude)
  }
}

/// A contractor offering demolition, removal or reclamation services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractorFields {
  pub name:      String,
  pub address:   String,
  pub zip_code:  String,
  pub city:      String,
  pub latitude:  f64,
  pub longitude: f64,
  #[serde(default)]
  pub email:     Option<String>,
  #[serde(default)]
  pub phone:     Option<String>,
}

impl EntityFields for ContractorFields {
  const KIND: EntityKind = EntityKind::Contractor;

  fn title(&self) -> &str { &self.name }

  fn validate(&self) -> Result<()> {
    require_text("name", &self.name)?;
    validate_coordinates(self.latitude, self.longitude)
  }
}
