//! The `ExchangeStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `rondas-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  account::{Account, NewAccount},
  entity::{Entity, EntityFields, FilterOptions, NewEntity},
  search::{SearchPage, SearchQuery},
  taxonomy::{Dimension, OnMissing, TypeEntry},
};

/// Abstraction over a Rondas storage backend.
///
/// Entity operations are generic over the scalar payload `F`; the entity kind
/// and its tag slots come from `F::KIND`. Every write that touches more than
/// one row (batch creation, full replacement, bulk deletion) is atomic.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ExchangeStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Type registry ─────────────────────────────────────────────────────

  /// Exact-match lookup; `NotFound` when `label` is not in `dimension`.
  fn resolve_by_label<'a>(
    &'a self,
    dimension: Dimension,
    label: &'a str,
  ) -> impl Future<Output = Result<TypeEntry, Self::Error>> + Send + 'a;

  /// Lookup by the normalised label, inserting a new entry with the next id
  /// of the dimension on a miss.
  fn resolve_or_create_by_label<'a>(
    &'a self,
    dimension: Dimension,
    label: &'a str,
  ) -> impl Future<Output = Result<TypeEntry, Self::Error>> + Send + 'a;

  /// All entries of a dimension, ordered by id.
  fn list_by_discriminator(
    &self,
    dimension: Dimension,
  ) -> impl Future<Output = Result<Vec<TypeEntry>, Self::Error>> + Send + '_;

  /// Resolve a set of labels under `on_missing`. With [`OnMissing::Throw`]
  /// a single unknown label fails the whole call with a validation error
  /// naming it. Duplicates collapse; the result is ordered by id.
  fn resolve_tags<'a>(
    &'a self,
    dimension: Dimension,
    labels: &'a [String],
    on_missing: OnMissing,
  ) -> impl Future<Output = Result<Vec<TypeEntry>, Self::Error>> + Send + 'a;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Persist a non-empty batch in one transaction. Any failing request
  /// rejects the whole batch.
  fn create_batch<F: EntityFields>(
    &self,
    requests: Vec<NewEntity<F>>,
  ) -> impl Future<Output = Result<Vec<Entity<F>>, Self::Error>> + Send + '_;

  /// [`Self::create_batch`], recording `owner_id` as the owning account of
  /// every created entity.
  fn create_owned_batch<F: EntityFields>(
    &self,
    owner_id: i64,
    requests: Vec<NewEntity<F>>,
  ) -> impl Future<Output = Result<Vec<Entity<F>>, Self::Error>> + Send + '_;

  /// Retrieve an entity by id. Returns `None` if not found.
  fn get_entity<F: EntityFields>(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Entity<F>>, Self::Error>> + Send + '_;

  /// Every entity of the kind, in the kind's fixed sort order.
  fn list_entities<F: EntityFields>(
    &self,
  ) -> impl Future<Output = Result<Vec<Entity<F>>, Self::Error>> + Send + '_;

  /// Entities of the kind owned by `owner_id`, newest first.
  fn list_owned_entities<F: EntityFields>(
    &self,
    owner_id: i64,
  ) -> impl Future<Output = Result<Vec<Entity<F>>, Self::Error>> + Send + '_;

  /// Overwrite every scalar field and replace every tag set.
  fn update_entity<F: EntityFields>(
    &self,
    id: i64,
    request: NewEntity<F>,
  ) -> impl Future<Output = Result<Entity<F>, Self::Error>> + Send + '_;

  /// Delete an entity and its tag links, returning its last state.
  fn delete_entity<F: EntityFields>(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Entity<F>, Self::Error>> + Send + '_;

  /// Delete every entity of the kind (tag links first). Returns the number
  /// of entities removed.
  fn delete_all_entities<F: EntityFields>(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// One [`Self::list_by_discriminator`] per slot of the kind.
  fn filter_options<F: EntityFields>(
    &self,
  ) -> impl Future<Output = Result<FilterOptions, Self::Error>> + Send + '_;

  fn search<'a, F: EntityFields>(
    &'a self,
    query: &'a SearchQuery,
  ) -> impl Future<Output = Result<SearchPage<Entity<F>>, Self::Error>> + Send + 'a;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Fails with a validation error when the email is already registered.
  fn create_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  fn get_account(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn get_account_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;
}
