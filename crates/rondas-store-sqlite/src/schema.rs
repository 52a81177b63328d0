//! SQL schema for the Rondas SQLite store.
//!
//! The static DDL lives in [`SCHEMA`]. The parts that depend on the taxonomy
//! catalog (seed rows and the single-valued link index) are generated from
//! [`Dimension`] so the catalog stays the only place taxonomy values are
//! written down.

use rondas_core::taxonomy::Dimension;
use rusqlite::{Connection, Transaction};

/// Static DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per taxonomy value. Labels are unique within a dimension only.
CREATE TABLE IF NOT EXISTS type_entries (
    discriminator TEXT    NOT NULL,
    type_id       INTEGER NOT NULL,
    label         TEXT    NOT NULL,
    PRIMARY KEY (discriminator, type_id),
    UNIQUE (discriminator, label)
);

-- Collectors, contractors and building elements share one table; the
-- scalar payload is stored as JSON and `kind` tells them apart.
CREATE TABLE IF NOT EXISTS entities (
    entity_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    kind        TEXT NOT NULL,   -- 'building_element' | 'collector' | 'contractor'
    title       TEXT NOT NULL,
    search_key  TEXT NOT NULL,   -- case-folded title
    fields_json TEXT NOT NULL,
    owner_id    INTEGER REFERENCES accounts(account_id) ON DELETE SET NULL,
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tag_links (
    entity_id     INTEGER NOT NULL REFERENCES entities(entity_id) ON DELETE CASCADE,
    discriminator TEXT    NOT NULL,
    type_id       INTEGER NOT NULL,
    PRIMARY KEY (entity_id, discriminator, type_id),
    FOREIGN KEY (discriminator, type_id) REFERENCES type_entries(discriminator, type_id)
);

CREATE TABLE IF NOT EXISTS accounts (
    account_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    email             TEXT    NOT NULL UNIQUE,
    display_name      TEXT    NOT NULL,
    phone             TEXT,
    is_email_verified INTEGER NOT NULL DEFAULT 0,
    password_hash     TEXT    NOT NULL,
    created_at        TEXT    NOT NULL,
    updated_at        TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS entities_kind_created_idx ON entities(kind, created_at);
CREATE INDEX IF NOT EXISTS entities_kind_search_idx  ON entities(kind, search_key);
CREATE INDEX IF NOT EXISTS entities_owner_idx        ON entities(owner_id, created_at);
CREATE INDEX IF NOT EXISTS tag_links_type_idx        ON tag_links(discriminator, type_id);

PRAGMA user_version = 2;
";

/// Version 1 files predate entity ownership.
const ADD_OWNER: &str =
  "ALTER TABLE entities ADD COLUMN owner_id INTEGER REFERENCES accounts(account_id) ON DELETE SET NULL;";

/// Bring an existing file up to the current layout before [`SCHEMA`] runs.
/// Returns the version found on disk.
pub fn migrate(conn: &Connection) -> rusqlite::Result<i64> {
  let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
  if version == 1 {
    conn.execute_batch(ADD_OWNER)?;
  }
  Ok(version)
}

/// At most one link per (entity, dimension) for single-valued dimensions.
pub fn single_valued_index() -> String {
  let dims = Dimension::all()
    .filter(|d| d.is_single_valued())
    .map(|d| format!("'{}'", d.discriminator()))
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "CREATE UNIQUE INDEX IF NOT EXISTS tag_links_single_valued_idx
       ON tag_links(entity_id, discriminator)
       WHERE discriminator IN ({dims});"
  )
}

/// Insert every seed entry that is not there yet.
pub fn seed(tx: &Transaction<'_>) -> rusqlite::Result<usize> {
  let mut stmt = tx.prepare(
    "INSERT OR IGNORE INTO type_entries (discriminator, type_id, label)
     VALUES (?1, ?2, ?3)",
  )?;
  let mut inserted = 0;
  for dimension in Dimension::all() {
    for (id, label) in dimension.seed_entries() {
      inserted += stmt.execute(rusqlite::params![dimension.discriminator(), id, label])?;
    }
  }
  Ok(inserted)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn version_one_files_gain_the_owner_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch(
        "CREATE TABLE accounts (account_id INTEGER PRIMARY KEY);
         CREATE TABLE entities (
           entity_id INTEGER PRIMARY KEY AUTOINCREMENT,
           kind TEXT NOT NULL, title TEXT NOT NULL, search_key TEXT NOT NULL,
           fields_json TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL
         );
         PRAGMA user_version = 1;",
      )
      .unwrap();

    assert_eq!(migrate(&conn).unwrap(), 1);
    conn.execute_batch(SCHEMA).unwrap();

    let owner_columns: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM pragma_table_info('entities') WHERE name = 'owner_id'",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(owner_columns, 1);
    assert_eq!(migrate(&conn).unwrap(), 2);
  }

  #[test]
  fn single_valued_index_lists_only_single_dimensions() {
    let sql = single_valued_index();
    assert!(sql.contains("'BUILDING_ELEMENT_WORKSHEET'"));
    assert!(sql.contains("'HEALTH_STATUS'"));
    assert!(!sql.contains("'MATERIAL'"));
    assert!(!sql.contains("'BUILDING_ELEMENT_CONSTITUTION'"));
  }
}
