//! Generic entity repository.
//!
//! One set of functions serves every entity kind: the kind, its tag slots and
//! its sort order all come from `F::KIND`. Writes that touch several rows run
//! in a single transaction.

use std::collections::HashMap;

use chrono::{SubsecRound as _, Utc};
use rondas_core::{
  Error as CoreError,
  entity::{Entity, EntityFields, EntityKind, FilterOptions, NewEntity, SortOrder, TagLabels, TagSets},
};
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};

use crate::{
  Result,
  encode::{ENTITY_COLUMNS, RawEntity, RawTypeEntry, encode_dt},
  registry,
};

// ─── SQL helpers ─────────────────────────────────────────────────────────────

/// `?, ?, ?` with `n` placeholders.
pub fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

/// Begin a write transaction holding the write lock from the start, so reads
/// inside it cannot go stale before the first write.
pub fn write_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
  conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// `ORDER BY` for `order`, over the `e` alias.
fn order_clause(order: SortOrder) -> &'static str {
  match order {
    SortOrder::NameAscending => "ORDER BY e.search_key ASC, e.entity_id ASC",
    SortOrder::NewestFirst => "ORDER BY e.created_at DESC, e.entity_id DESC",
  }
}

/// The fixed `ORDER BY` clause of a kind.
pub fn order_by(kind: EntityKind) -> &'static str { order_clause(kind.sort_order()) }

fn not_found(kind: EntityKind, id: i64) -> crate::Error {
  CoreError::not_found(format!("{} {id} not found", kind.label())).into()
}

// ─── Tags ────────────────────────────────────────────────────────────────────

/// Resolve the labels of every slot of `kind`, enforcing required and
/// single-valued slots.
pub fn resolve_entity_tags(conn: &Connection, kind: EntityKind, labels: &TagLabels) -> Result<TagSets> {
  let mut sets = TagSets::new();
  for slot in kind.slots() {
    let entries =
      registry::resolve_tags(conn, slot.dimension, labels.get(slot.dimension), slot.on_missing)?;
    if slot.required && entries.is_empty() {
      return Err(CoreError::validation(format!("missing field `{}`", slot.field)).into());
    }
    if !slot.is_many() && entries.len() > 1 {
      return Err(
        CoreError::validation(format!("field `{}` takes a single label", slot.field)).into(),
      );
    }
    sets.insert(slot.dimension, entries);
  }
  Ok(sets)
}

fn insert_links(conn: &Connection, entity_id: i64, tags: &TagSets) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO tag_links (entity_id, discriminator, type_id) VALUES (?1, ?2, ?3)",
  )?;
  for entry in tags.iter() {
    stmt.execute(rusqlite::params![entity_id, entry.discriminator.discriminator(), entry.id])?;
  }
  Ok(())
}

/// Tag sets of every entity in `ids`, joined through the registry for labels.
fn load_tags(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, TagSets>> {
  let mut out: HashMap<i64, TagSets> = HashMap::new();
  if ids.is_empty() {
    return Ok(out);
  }

  let sql = format!(
    "SELECT l.entity_id, t.discriminator, t.type_id, t.label
       FROM tag_links l
       JOIN type_entries t ON t.discriminator = l.discriminator AND t.type_id = l.type_id
      WHERE l.entity_id IN ({})
      ORDER BY t.type_id",
    placeholders(ids.len())
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(rusqlite::params_from_iter(ids), |row| {
      Ok((row.get::<_, i64>(0)?, RawTypeEntry::from_row(row)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  for (entity_id, raw) in rows {
    out.entry(entity_id).or_default().push(raw.into_entry()?);
  }
  Ok(out)
}

/// Attach tags to already-fetched rows, keeping their order.
pub fn hydrate<F: EntityFields>(conn: &Connection, raws: Vec<RawEntity>) -> Result<Vec<Entity<F>>> {
  let ids: Vec<i64> = raws.iter().map(|r| r.entity_id).collect();
  let mut tags = load_tags(conn, &ids)?;
  raws
    .into_iter()
    .map(|raw| {
      let sets = tags.remove(&raw.entity_id).unwrap_or_default();
      raw.into_entity(sets)
    })
    .collect()
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn get<F: EntityFields>(conn: &Connection, id: i64) -> Result<Option<Entity<F>>> {
  let raw = conn
    .query_row(
      &format!("SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.entity_id = ?1 AND e.kind = ?2"),
      rusqlite::params![id, F::KIND.discriminant()],
      RawEntity::from_row,
    )
    .optional()?;
  Ok(hydrate(conn, raw.into_iter().collect())?.pop())
}

pub fn list<F: EntityFields>(conn: &Connection) -> Result<Vec<Entity<F>>> {
  let sql = format!(
    "SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.kind = ?1 {}",
    order_by(F::KIND)
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(rusqlite::params![F::KIND.discriminant()], RawEntity::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  hydrate(conn, raws)
}

/// Entities of the kind owned by `owner_id`, newest first.
pub fn list_owned<F: EntityFields>(conn: &Connection, owner_id: i64) -> Result<Vec<Entity<F>>> {
  let sql = format!(
    "SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.kind = ?1 AND e.owner_id = ?2 {}",
    order_clause(SortOrder::NewestFirst)
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(rusqlite::params![F::KIND.discriminant(), owner_id], RawEntity::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  hydrate(conn, raws)
}

pub fn filter_options<F: EntityFields>(conn: &Connection) -> Result<FilterOptions> {
  let options = F::KIND
    .slots()
    .iter()
    .map(|slot| -> Result<_> { Ok((slot.dimension, registry::list(conn, slot.dimension)?)) })
    .collect::<Result<_>>()?;
  Ok(FilterOptions { kind: F::KIND, options })
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Persist `requests` in one transaction, recording `owner_id` on each row.
pub fn create_batch<F: EntityFields>(
  conn: &mut Connection,
  owner_id: Option<i64>,
  requests: Vec<NewEntity<F>>,
) -> Result<Vec<Entity<F>>> {
  let kind = F::KIND;
  if requests.is_empty() {
    return Err(
      CoreError::validation(format!("expected at least one {} to create", kind.label())).into(),
    );
  }

  let tx = write_tx(conn)?;
  let now = Utc::now().trunc_subsecs(6);
  let now_str = encode_dt(now);
  let mut created = Vec::with_capacity(requests.len());

  for NewEntity { fields, tags } in requests {
    fields.validate()?;
    let tags = resolve_entity_tags(&tx, kind, &tags)?;
    tx.execute(
      "INSERT INTO entities (kind, title, search_key, fields_json, owner_id, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
      rusqlite::params![
        kind.discriminant(),
        fields.title(),
        rondas_core::search::fold(fields.title()),
        serde_json::to_string(&fields)?,
        owner_id,
        now_str,
      ],
    )?;
    let id = tx.last_insert_rowid();
    insert_links(&tx, id, &tags)?;
    created.push(Entity { id, owner_id, created_at: now, updated_at: now, fields, tags });
  }

  tx.commit()?;
  tracing::info!(kind = kind.discriminant(), count = created.len(), "created entities");
  Ok(created)
}

/// Overwrite the scalar fields and replace every tag set of entity `id`.
pub fn update<F: EntityFields>(
  conn: &mut Connection,
  id: i64,
  request: NewEntity<F>,
) -> Result<Entity<F>> {
  let kind = F::KIND;
  let NewEntity { fields, tags } = request;
  fields.validate()?;

  let tx = write_tx(conn)?;
  let tags = resolve_entity_tags(&tx, kind, &tags)?;
  let changed = tx.execute(
    "UPDATE entities SET title = ?1, search_key = ?2, fields_json = ?3, updated_at = ?4
      WHERE entity_id = ?5 AND kind = ?6",
    rusqlite::params![
      fields.title(),
      rondas_core::search::fold(fields.title()),
      serde_json::to_string(&fields)?,
      encode_dt(Utc::now()),
      id,
      kind.discriminant(),
    ],
  )?;
  if changed == 0 {
    return Err(not_found(kind, id));
  }

  tx.execute("DELETE FROM tag_links WHERE entity_id = ?1", rusqlite::params![id])?;
  insert_links(&tx, id, &tags)?;
  let updated = get::<F>(&tx, id)?.ok_or_else(|| not_found(kind, id))?;
  tx.commit()?;
  Ok(updated)
}

/// Delete entity `id` with its tag links, returning its last state.
pub fn delete<F: EntityFields>(conn: &mut Connection, id: i64) -> Result<Entity<F>> {
  let kind = F::KIND;
  let tx = write_tx(conn)?;
  let snapshot = get::<F>(&tx, id)?.ok_or_else(|| not_found(kind, id))?;
  tx.execute("DELETE FROM tag_links WHERE entity_id = ?1", rusqlite::params![id])?;
  tx.execute("DELETE FROM entities WHERE entity_id = ?1", rusqlite::params![id])?;
  tx.commit()?;
  Ok(snapshot)
}

/// Delete every entity of the kind. Links go first.
pub fn delete_all<F: EntityFields>(conn: &mut Connection) -> Result<u64> {
  let kind = F::KIND.discriminant();
  let tx = write_tx(conn)?;
  tx.execute(
    "DELETE FROM tag_links
      WHERE entity_id IN (SELECT entity_id FROM entities WHERE kind = ?1)",
    rusqlite::params![kind],
  )?;
  let deleted = tx.execute("DELETE FROM entities WHERE kind = ?1", rusqlite::params![kind])?;
  tx.commit()?;
  tracing::info!(kind, deleted, "deleted all entities");
  Ok(deleted as u64)
}
