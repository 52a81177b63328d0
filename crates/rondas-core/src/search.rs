//! Filtered search request and result types.
//!
//! A search is a conjunction: an optional case-insensitive substring match on
//! the entity's title, plus one "tag set intersects these ids" predicate per
//! non-empty dimension filter. Ordering is fixed per entity kind.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entity::EntityKind,
  taxonomy::Dimension,
};

// ─── Wire request ────────────────────────────────────────────────────────────

/// Body of `POST /{entity}/search/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
  #[serde(default)]
  pub query:  TextQuery,
  /// Keyed by `<slot>_ids`, e.g. `material_type_ids`.
  #[serde(default)]
  pub filter: BTreeMap<String, Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextQuery {
  #[serde(default)]
  pub text: String,
}

// ─── Validated query ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
  /// `None` means no text predicate.
  pub text:      Option<String>,
  /// Only non-empty id sets are kept; an absent dimension is unconstrained.
  pub filters:   BTreeMap<Dimension, BTreeSet<i64>>,
  pub page:      usize,
  pub page_size: usize,
}

impl SearchQuery {
  /// Everything, first page.
  pub fn all(page_size: usize) -> Self {
    Self { text: None, filters: BTreeMap::new(), page: 0, page_size }
  }

  /// Validate a wire request against the slots of `kind`.
  pub fn from_request(
    kind: EntityKind,
    request: SearchRequest,
    page: usize,
    page_size: usize,
  ) -> Result<Self> {
    if page_size == 0 {
      return Err(Error::validation("page size must be positive"));
    }

    let mut filters = BTreeMap::new();
    for (key, ids) in request.filter {
      let slot = kind
        .slots()
        .iter()
        .find(|s| s.filter_key() == key)
        .ok_or_else(|| {
          Error::validation(format!("unknown {} filter `{key}`", kind.label()))
        })?;
      if !ids.is_empty() {
        filters.insert(slot.dimension, ids.into_iter().collect());
      }
    }

    let mut query = Self::all(page_size).with_text(&request.query.text);
    query.filters = filters;
    query.page = page;
    Ok(query)
  }

  pub fn with_text(mut self, text: &str) -> Self {
    let text = text.trim();
    self.text = (!text.is_empty()).then(|| text.to_owned());
    self
  }

  pub fn with_filter(mut self, dimension: Dimension, ids: &[i64]) -> Self {
    if !ids.is_empty() {
      self.filters.insert(dimension, ids.iter().copied().collect());
    }
    self
  }

  pub fn with_page(mut self, page: usize) -> Self {
    self.page = page;
    self
  }

  pub fn offset(&self) -> usize { self.page.saturating_mul(self.page_size) }
}

// ─── Result page ─────────────────────────────────────────────────────────────

/// One page of results. `has_more` is exact: the store looks one row past the
/// page boundary rather than guessing from a full page.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage<T> {
  pub results:  Vec<T>,
  #[serde(rename = "hasMore")]
  pub has_more: bool,
}

/// Case-fold `text` the same way titles are folded on write.
pub fn fold(text: &str) -> String { text.to_lowercase() }

/// Escape `text` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in fold(text).chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}
