//! Tagged entities and the generic tag-slot model.
//!
//! A tagged entity is a scalar payload (`F: EntityFields`) plus one tag set
//! per declared slot. Slots are declared once per [`EntityKind`]; the wire
//! format, the search filter keys, and the filter-option keys are all derived
//! from them, so adding a dimension to an entity is a one-line change.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{
  Deserialize, Deserializer, Serialize, Serializer,
  de::{DeserializeOwned, Error as _},
  ser::{Error as _, SerializeMap},
};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  taxonomy::{Dimension, OnMissing, TypeEntry},
};

// ─── Slots ───────────────────────────────────────────────────────────────────

/// One tag dimension as it appears on a particular entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSlot {
  /// JSON field name on create requests and read models.
  pub field:      &'static str,
  pub dimension:  Dimension,
  /// A required slot must carry at least one label on create and update.
  pub required:   bool,
  pub on_missing: OnMissing,
}

impl TagSlot {
  const fn strict(field: &'static str, dimension: Dimension) -> Self {
    Self { field, dimension, required: false, on_missing: OnMissing::Throw }
  }

  const fn required(self) -> Self { Self { required: true, ..self } }

  const fn freeform(self) -> Self {
    Self { on_missing: OnMissing::Create, ..self }
  }

  pub fn is_many(&self) -> bool { !self.dimension.is_single_valued() }

  /// Singular stem, e.g. `material_type` for `material_types`.
  fn stem(&self) -> &'static str {
    if self.is_many() {
      self.field.strip_suffix('s').unwrap_or(self.field)
    } else {
      self.field
    }
  }

  /// Key of this slot in filter-option responses, e.g. `worksheet_types`.
  pub fn options_key(&self) -> String { format!("{}s", self.stem()) }

  /// Key of this slot in search filters, e.g. `worksheet_type_ids`.
  pub fn filter_key(&self) -> String { format!("{}_ids", self.stem()) }
}

// ─── Entity kinds ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  BuildingElement,
  Collector,
  Contractor,
}

/// Fixed result ordering per entity kind; callers cannot change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  /// Case-insensitive ascending by name, ties by id.
  NameAscending,
  /// Descending by creation time, ties by descending id.
  NewestFirst,
}

const BUILDING_ELEMENT_SLOTS: &[TagSlot] = &[
  TagSlot::strict("worksheet_type", Dimension::BuildingElementWorksheet).required(),
  TagSlot::strict("category_type", Dimension::BuildingElementCategory)
    .required()
    .freeform(),
  TagSlot::strict("unit_type", Dimension::BuildingElementUnit).required(),
  TagSlot::strict("constitution_types", Dimension::BuildingElementConstitution)
    .freeform(),
  TagSlot::strict("material_types", Dimension::Material),
  TagSlot::strict("waste_code_types", Dimension::WasteCode),
  TagSlot::strict("health_status_type", Dimension::HealthStatus),
  TagSlot::strict("reuse_potential_type", Dimension::ReusePotential),
  TagSlot::strict("recycling_potential_type", Dimension::RecyclingPotential),
];

const COLLECTOR_SLOTS: &[TagSlot] = &[
  TagSlot::strict("material_types", Dimension::Material),
  TagSlot::strict("waste_code_types", Dimension::WasteCode),
  TagSlot::strict("authorized_vehicle_types", Dimension::AuthorizedVehicle),
  TagSlot::strict("circular_strategy_types", Dimension::CircularStrategy),
];

const CONTRACTOR_SLOTS: &[TagSlot] = &[
  TagSlot::strict("material_types", Dimension::Material),
  TagSlot::strict("waste_code_types", Dimension::WasteCode),
  TagSlot::strict("circular_service_types", Dimension::CircularService),
];

impl EntityKind {
  /// The discriminant stored in the `kind` column.
  pub fn discriminant(self) -> &'static str {
    match self {
      Self::BuildingElement => "building_element",
      Self::Collector => "collector",
      Self::Contractor => "contractor",
    }
  }

  pub fn from_discriminant(s: &str) -> Option<Self> {
    match s {
      "building_element" => Some(Self::BuildingElement),
      "collector" => Some(Self::Collector),
      "contractor" => Some(Self::Contractor),
      _ => None,
    }
  }

  /// Human-readable name for error messages.
  pub fn label(self) -> &'static str {
    match self {
      Self::BuildingElement => "building element",
      Self::Collector => "collector",
      Self::Contractor => "contractor",
    }
  }

  pub fn slots(self) -> &'static [TagSlot] {
    match self {
      Self::BuildingElement => BUILDING_ELEMENT_SLOTS,
      Self::Collector => COLLECTOR_SLOTS,
      Self::Contractor => CONTRACTOR_SLOTS,
    }
  }

  pub fn slot(self, dimension: Dimension) -> Option<&'static TagSlot> {
    self.slots().iter().find(|s| s.dimension == dimension)
  }

  pub fn sort_order(self) -> SortOrder {
    match self {
      Self::BuildingElement => SortOrder::NewestFirst,
      Self::Collector | Self::Contractor => SortOrder::NameAscending,
    }
  }
}

// ─── Payload trait ───────────────────────────────────────────────────────────

/// The scalar part of a tagged entity. Implementors are plain serde structs;
/// the tag slots are handled generically by [`NewEntity`] and [`Entity`].
pub trait EntityFields:
  Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send + Sync + 'static
{
  const KIND: EntityKind;

  /// The field searched by free text and used for name ordering.
  fn title(&self) -> &str;

  fn validate(&self) -> Result<()> { Ok(()) }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(format!("field `{field}` must not be blank")));
  }
  Ok(())
}

pub(crate) fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
  if !(-90.0..=90.0).contains(&latitude) {
    return Err(Error::validation(format!("latitude {latitude} is out of range")));
  }
  if !(-180.0..=180.0).contains(&longitude) {
    return Err(Error::validation(format!("longitude {longitude} is out of range")));
  }
  Ok(())
}

// ─── Tag labels (input) ──────────────────────────────────────────────────────

/// Caller-supplied labels per dimension, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagLabels(BTreeMap<Dimension, Vec<String>>);

impl TagLabels {
  pub fn new() -> Self { Self::default() }

  pub fn with(mut self, dimension: Dimension, labels: &[&str]) -> Self {
    self.insert(dimension, labels.iter().map(|l| (*l).to_owned()).collect());
    self
  }

  pub fn insert(&mut self, dimension: Dimension, labels: Vec<String>) {
    self.0.insert(dimension, labels);
  }

  pub fn get(&self, dimension: Dimension) -> &[String] {
    self.0.get(&dimension).map(Vec::as_slice).unwrap_or_default()
  }
}

// ─── Tag sets (resolved) ─────────────────────────────────────────────────────

/// Resolved type entries per dimension. Each set is ordered by id and free of
/// duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSets(BTreeMap<Dimension, Vec<TypeEntry>>);

impl TagSets {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, dimension: Dimension, mut entries: Vec<TypeEntry>) {
    entries.sort_by_key(|e| e.id);
    entries.dedup_by_key(|e| e.id);
    self.0.insert(dimension, entries);
  }

  /// Add a single entry, keeping the set ordered and deduplicated.
  pub fn push(&mut self, entry: TypeEntry) {
    let set = self.0.entry(entry.discriminator).or_default();
    if let Err(pos) = set.binary_search_by_key(&entry.id, |e| e.id) {
      set.insert(pos, entry);
    }
  }

  pub fn get(&self, dimension: Dimension) -> &[TypeEntry] {
    self.0.get(&dimension).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn labels(&self, dimension: Dimension) -> Vec<&str> {
    self.get(dimension).iter().map(|e| e.label.as_str()).collect()
  }

  pub fn iter(&self) -> impl Iterator<Item = &TypeEntry> {
    self.0.values().flatten()
  }
}

// ─── NewEntity ───────────────────────────────────────────────────────────────

/// Create or full-replace request for an entity of kind `F::KIND`.
///
/// On the wire it is a single flat object: the scalar fields of `F` side by
/// side with one key per tag slot (a label for single-valued slots, an array
/// of labels for multi-valued ones).
#[derive(Debug, Clone)]
pub struct NewEntity<F> {
  pub fields: F,
  pub tags:   TagLabels,
}

impl<F: EntityFields> NewEntity<F> {
  pub fn new(fields: F, tags: TagLabels) -> Self { Self { fields, tags } }

  /// Split a flat JSON object into scalar fields and tag labels.
  pub fn from_json(mut map: Map<String, Value>) -> Result<Self> {
    let mut tags = TagLabels::new();

    for slot in F::KIND.slots() {
      let labels = match map.remove(slot.field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(label)) if !slot.is_many() => vec![label],
        Some(Value::Array(items)) if slot.is_many() => items
          .into_iter()
          .map(|item| match item {
            Value::String(label) => Ok(label),
            _ => Err(Error::validation(format!(
              "field `{}` must contain only labels",
              slot.field
            ))),
          })
          .collect::<Result<_>>()?,
        Some(_) => {
          let expected = if slot.is_many() { "an array of labels" } else { "a label" };
          return Err(Error::validation(format!(
            "field `{}` must be {expected}",
            slot.field
          )));
        }
      };

      if slot.required && labels.iter().all(|l| l.trim().is_empty()) {
        return Err(Error::validation(format!("missing field `{}`", slot.field)));
      }
      tags.insert(slot.dimension, labels);
    }

    let fields: F = serde_json::from_value(Value::Object(map))
      .map_err(|e| Error::validation(e.to_string()))?;
    fields.validate()?;

    Ok(Self { fields, tags })
  }

  pub fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::Object(map) => Self::from_json(map),
      _ => Err(Error::validation(format!(
        "{} payload must be an object",
        F::KIND.label()
      ))),
    }
  }
}

impl<'de, F: EntityFields> Deserialize<'de> for NewEntity<F> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Self::from_value(value).map_err(D::Error::custom)
  }
}

impl<F: EntityFields> Serialize for NewEntity<F> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let fields = fields_object(&self.fields).map_err(S::Error::custom)?;
    let mut map = serializer.serialize_map(None)?;
    for (k, v) in &fields {
      map.serialize_entry(k, v)?;
    }
    for slot in F::KIND.slots() {
      let labels = self.tags.get(slot.dimension);
      if slot.is_many() {
        map.serialize_entry(slot.field, labels)?;
      } else {
        map.serialize_entry(slot.field, &labels.first())?;
      }
    }
    map.end()
  }
}

// ─── Entity (read model) ─────────────────────────────────────────────────────

/// A persisted entity with its resolved tags.
///
/// Serialises to the denormalised read shape: scalar fields, then each slot
/// rendered as label strings rather than ids. `account_id` appears only on
/// owned entities.
#[derive(Debug, Clone)]
pub struct Entity<F> {
  pub id:         i64,
  /// Account that created the entity, when it was created on behalf of one.
  pub owner_id:   Option<i64>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub fields:     F,
  pub tags:       TagSets,
}

impl<F: EntityFields> Entity<F> {
  pub fn labels(&self, dimension: Dimension) -> Vec<&str> {
    self.tags.labels(dimension)
  }
}

impl<F: EntityFields> Serialize for Entity<F> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let fields = fields_object(&self.fields).map_err(S::Error::custom)?;
    let mut map = serializer.serialize_map(None)?;
    map.serialize_entry("id", &self.id)?;
    for (k, v) in &fields {
      map.serialize_entry(k, v)?;
    }
    for slot in F::KIND.slots() {
      let labels = self.tags.labels(slot.dimension);
      if slot.is_many() {
        map.serialize_entry(slot.field, &labels)?;
      } else {
        map.serialize_entry(slot.field, &labels.first())?;
      }
    }
    if let Some(owner_id) = self.owner_id {
      map.serialize_entry("account_id", &owner_id)?;
    }
    map.serialize_entry("created_at", &self.created_at)?;
    map.serialize_entry("updated_at", &self.updated_at)?;
    map.end()
  }
}

fn fields_object<F: Serialize>(fields: &F) -> Result<Map<String, Value>> {
  match serde_json::to_value(fields)? {
    Value::Object(map) => Ok(map),
    _ => Err(Error::Internal("entity fields must serialise to an object".into())),
  }
}

// ─── Filter options ──────────────────────────────────────────────────────────

/// Every entry of every dimension declared by `kind`, for building filter
/// controls. Serialised as `{ "<slot>s": [TypeEntry, ...], ... }` in slot
/// order.
#[derive(Debug, Clone)]
pub struct FilterOptions {
  pub kind:    EntityKind,
  pub options: BTreeMap<Dimension, Vec<TypeEntry>>,
}

impl FilterOptions {
  pub fn get(&self, dimension: Dimension) -> &[TypeEntry] {
    self.options.get(&dimension).map(Vec::as_slice).unwrap_or_default()
  }
}

impl Serialize for FilterOptions {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let slots = self.kind.slots();
    let mut map = serializer.serialize_map(Some(slots.len()))?;
    for slot in slots {
      map.serialize_entry(&slot.options_key(), self.get(slot.dimension))?;
    }
    map.end()
  }
}
