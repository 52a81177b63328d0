//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC so that text
//! ordering matches time ordering. Entity payloads are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use rondas_core::{
  account::Account,
  entity::{Entity, EntityFields, TagSets},
  taxonomy::{Dimension, TypeEntry},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Dimension ───────────────────────────────────────────────────────────────

pub fn decode_dimension(s: &str) -> Result<Dimension> {
  Dimension::from_discriminator(s)
    .ok_or_else(|| Error::Decode(format!("unknown discriminator: {s:?}")))
}

/// A `type_entries` row as read from SQLite.
pub struct RawTypeEntry {
  pub discriminator: String,
  pub type_id:       i64,
  pub label:         String,
}

impl RawTypeEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      discriminator: row.get("discriminator")?,
      type_id:       row.get("type_id")?,
      label:         row.get("label")?,
    })
  }

  pub fn into_entry(self) -> Result<TypeEntry> {
    Ok(TypeEntry {
      discriminator: decode_dimension(&self.discriminator)?,
      id:            self.type_id,
      label:         self.label,
    })
  }
}

// ─── Entities ────────────────────────────────────────────────────────────────

/// Columns selected for every entity read, in [`RawEntity::from_row`] order.
pub const ENTITY_COLUMNS: &str =
  "e.entity_id, e.fields_json, e.owner_id, e.created_at, e.updated_at";

/// An `entities` row before its payload is decoded and tags attached.
pub struct RawEntity {
  pub entity_id:   i64,
  pub fields_json: String,
  pub owner_id:    Option<i64>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawEntity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:   row.get(0)?,
      fields_json: row.get(1)?,
      owner_id:    row.get(2)?,
      created_at:  row.get(3)?,
      updated_at:  row.get(4)?,
    })
  }

  pub fn into_entity<F: EntityFields>(self, tags: TagSets) -> Result<Entity<F>> {
    Ok(Entity {
      id: self.entity_id,
      owner_id: self.owner_id,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      fields: serde_json::from_str(&self.fields_json)?,
      tags,
    })
  }
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub const ACCOUNT_COLUMNS: &str = "account_id, email, display_name, phone, \
                                   is_email_verified, password_hash, created_at, updated_at";

pub struct RawAccount {
  pub account_id:        i64,
  pub email:             String,
  pub display_name:      String,
  pub phone:             Option<String>,
  pub is_email_verified: bool,
  pub password_hash:     String,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawAccount {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:        row.get(0)?,
      email:             row.get(1)?,
      display_name:      row.get(2)?,
      phone:             row.get(3)?,
      is_email_verified: row.get(4)?,
      password_hash:     row.get(5)?,
      created_at:        row.get(6)?,
      updated_at:        row.get(7)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      id:                self.account_id,
      email:             self.email,
      display_name:      self.display_name,
      phone:             self.phone,
      is_email_verified: self.is_email_verified,
      password_hash:     self.password_hash,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}
