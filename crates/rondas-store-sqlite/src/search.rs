//! Filtered search.
//!
//! The statement is assembled from the query: the kind predicate, an
//! optional `LIKE` on the folded title, and one `EXISTS` per dimension
//! filter, all ANDed. One row past the page is fetched so `has_more` is exact.

use rondas_core::{
  Error as CoreError,
  entity::{Entity, EntityFields},
  search::{SearchPage, SearchQuery, like_pattern},
};
use rusqlite::{Connection, types::Value};

use crate::{
  Result,
  encode::{ENTITY_COLUMNS, RawEntity},
  repository::{hydrate, order_by, placeholders},
};

pub fn search<F: EntityFields>(
  conn: &Connection,
  query: &SearchQuery,
) -> Result<SearchPage<Entity<F>>> {
  let kind = F::KIND;
  if query.page_size == 0 {
    return Err(CoreError::validation("page size must be positive").into());
  }

  let mut sql = format!("SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.kind = ?");
  let mut params: Vec<Value> = vec![Value::Text(kind.discriminant().to_owned())];

  if let Some(text) = &query.text {
    sql.push_str(" AND e.search_key LIKE ? ESCAPE '\\'");
    params.push(Value::Text(like_pattern(text)));
  }

  for (dimension, ids) in &query.filters {
    if kind.slot(*dimension).is_none() {
      return Err(
        CoreError::validation(format!("{} has no {dimension} tags", kind.label())).into(),
      );
    }
    if ids.is_empty() {
      continue;
    }
    sql.push_str(&format!(
      " AND EXISTS (SELECT 1 FROM tag_links l
                     WHERE l.entity_id = e.entity_id
                       AND l.discriminator = ?
                       AND l.type_id IN ({}))",
      placeholders(ids.len())
    ));
    params.push(Value::Text(dimension.discriminator().to_owned()));
    params.extend(ids.iter().map(|id| Value::Integer(*id)));
  }

  sql.push(' ');
  sql.push_str(order_by(kind));
  sql.push_str(" LIMIT ? OFFSET ?");
  let limit = i64::try_from(query.page_size).unwrap_or(i64::MAX).saturating_add(1);
  let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);
  params.push(Value::Integer(limit));
  params.push(Value::Integer(offset));

  let mut stmt = conn.prepare(&sql)?;
  let mut raws = stmt
    .query_map(rusqlite::params_from_iter(params), RawEntity::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let has_more = raws.len() > query.page_size;
  raws.truncate(query.page_size);
  tracing::debug!(
    kind = kind.discriminant(),
    page = query.page,
    returned = raws.len(),
    has_more,
    "search"
  );

  Ok(SearchPage { results: hydrate(conn, raws)?, has_more })
}
