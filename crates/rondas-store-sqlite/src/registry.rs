//! Type registry and tag resolution.
//!
//! Everything here runs on a borrowed connection so callers decide the
//! transaction boundary: a batch create resolves all of its tags inside the
//! same transaction that writes the entities, so lazily created entries
//! disappear with a rolled-back batch.

use rondas_core::{
  Error as CoreError,
  taxonomy::{Dimension, OnMissing, TypeEntry, normalize_label},
};
use rusqlite::{Connection, OptionalExtension as _};

use crate::{
  Result,
  encode::RawTypeEntry,
  error::is_constraint_violation,
};

/// How many times a lost insert race is retried before surfacing a conflict.
const CREATE_RETRIES: usize = 1;

pub fn lookup(conn: &Connection, dimension: Dimension, label: &str) -> Result<Option<TypeEntry>> {
  conn
    .query_row(
      "SELECT discriminator, type_id, label FROM type_entries
       WHERE discriminator = ?1 AND label = ?2",
      rusqlite::params![dimension.discriminator(), label],
      RawTypeEntry::from_row,
    )
    .optional()?
    .map(RawTypeEntry::into_entry)
    .transpose()
}

pub fn resolve_by_label(conn: &Connection, dimension: Dimension, label: &str) -> Result<TypeEntry> {
  lookup(conn, dimension, label)?.ok_or_else(|| {
    CoreError::not_found(format!("no {dimension} entry labelled `{label}`")).into()
  })
}

/// Look up the normalised label, inserting it with the next free id of the
/// dimension on a miss.
pub fn resolve_or_create(conn: &Connection, dimension: Dimension, label: &str) -> Result<TypeEntry> {
  let label = normalize_label(label);
  if label.is_empty() {
    return Err(CoreError::validation(format!("{dimension} label must not be blank")).into());
  }
  if let Some(entry) = lookup(conn, dimension, &label)? {
    return Ok(entry);
  }

  for _ in 0..=CREATE_RETRIES {
    match insert_next(conn, dimension, &label) {
      Ok(id) => {
        tracing::info!(%dimension, id, %label, "created taxonomy entry");
        return Ok(TypeEntry { discriminator: dimension, id, label });
      }
      // Another writer took the label or the id; whichever it was, re-read.
      Err(e) if is_constraint_violation(&e) => {
        if let Some(entry) = lookup(conn, dimension, &label)? {
          return Ok(entry);
        }
      }
      Err(e) => return Err(e.into()),
    }
  }

  Err(CoreError::Conflict(format!("could not allocate {dimension} entry `{label}`")).into())
}

fn insert_next(conn: &Connection, dimension: Dimension, label: &str) -> rusqlite::Result<i64> {
  conn.query_row(
    "INSERT INTO type_entries (discriminator, type_id, label)
     SELECT ?1, COALESCE(MAX(type_id), 0) + 1, ?2
       FROM type_entries WHERE discriminator = ?1
     RETURNING type_id",
    rusqlite::params![dimension.discriminator(), label],
    |row| row.get(0),
  )
}

pub fn list(conn: &Connection, dimension: Dimension) -> Result<Vec<TypeEntry>> {
  let mut stmt = conn.prepare(
    "SELECT discriminator, type_id, label FROM type_entries
     WHERE discriminator = ?1 ORDER BY type_id",
  )?;
  let raws = stmt
    .query_map(rusqlite::params![dimension.discriminator()], RawTypeEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTypeEntry::into_entry).collect()
}

/// Resolve every label of one dimension under `on_missing`.
///
/// Blank labels are ignored. Under [`OnMissing::Throw`] the first unknown
/// label fails the call and nothing is written. The result is ordered by id
/// without duplicates.
pub fn resolve_tags(
  conn: &Connection,
  dimension: Dimension,
  labels: &[String],
  on_missing: OnMissing,
) -> Result<Vec<TypeEntry>> {
  let labels: Vec<&str> = labels
    .iter()
    .map(|l| l.as_str())
    .filter(|l| !l.trim().is_empty())
    .collect();

  let mut entries = match on_missing {
    OnMissing::Throw => labels
      .iter()
      .map(|label| -> Result<TypeEntry> {
        lookup(conn, dimension, label)?.ok_or_else(|| {
          CoreError::validation(format!("unknown {dimension} label `{label}`")).into()
        })
      })
      .collect::<Result<Vec<_>>>()?,
    OnMissing::Create => labels
      .iter()
      .map(|label| resolve_or_create(conn, dimension, label))
      .collect::<Result<Vec<_>>>()?,
  };

  entries.sort_by_key(|e| e.id);
  entries.dedup_by_key(|e| e.id);
  Ok(entries)
}
