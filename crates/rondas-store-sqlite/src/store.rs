//! [`SqliteStore`], the SQLite implementation of [`ExchangeStore`].

use std::{path::Path, time::Duration};

use rondas_core::{
  account::{Account, NewAccount},
  entity::{Entity, EntityFields, FilterOptions, NewEntity},
  search::{SearchPage, SearchQuery},
  store::ExchangeStore,
  taxonomy::{Dimension, OnMissing, TypeEntry},
};

use crate::{
  Error, Result, accounts, registry, repository,
  repository::write_tx,
  schema::{SCHEMA, migrate, seed, single_valued_index},
  search,
};

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rondas exchange store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's worker thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, run schema initialisation and seed
  /// the taxonomy catalog.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  pub(crate) async fn init_schema(&self) -> Result<()> {
    let seeded = self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrate(conn)?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&single_valued_index())?;
        let tx = write_tx(conn)?;
        let seeded = seed(&tx)?;
        tx.commit()?;
        Ok(seeded)
      })
      .await?;
    if seeded > 0 {
      tracing::info!(seeded, "seeded taxonomy catalog");
    }
    Ok(())
  }

  /// Run `f` on the database thread and flatten both error layers.
  async fn run<T, Func>(&self, f: Func) -> Result<T>
  where
    T: Send + 'static,
    Func: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── ExchangeStore impl ──────────────────────────────────────────────────────

impl ExchangeStore for SqliteStore {
  type Error = Error;

  // ── Type registry ─────────────────────────────────────────────────────────

  async fn resolve_by_label(&self, dimension: Dimension, label: &str) -> Result<TypeEntry> {
    let label = label.to_owned();
    self.run(move |conn| registry::resolve_by_label(conn, dimension, &label)).await
  }

  async fn resolve_or_create_by_label(
    &self,
    dimension: Dimension,
    label: &str,
  ) -> Result<TypeEntry> {
    let label = label.to_owned();
    self
      .run(move |conn| {
        let tx = write_tx(conn)?;
        let entry = registry::resolve_or_create(&tx, dimension, &label)?;
        tx.commit()?;
        Ok(entry)
      })
      .await
  }

  async fn list_by_discriminator(&self, dimension: Dimension) -> Result<Vec<TypeEntry>> {
    self.run(move |conn| registry::list(conn, dimension)).await
  }

  async fn resolve_tags(
    &self,
    dimension: Dimension,
    labels: &[String],
    on_missing: OnMissing,
  ) -> Result<Vec<TypeEntry>> {
    let labels = labels.to_vec();
    self
      .run(move |conn| {
        let tx = write_tx(conn)?;
        let entries = registry::resolve_tags(&tx, dimension, &labels, on_missing)?;
        tx.commit()?;
        Ok(entries)
      })
      .await
  }

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn create_batch<F: EntityFields>(
    &self,
    requests: Vec<NewEntity<F>>,
  ) -> Result<Vec<Entity<F>>> {
    self.run(move |conn| repository::create_batch(conn, None, requests)).await
  }

  async fn create_owned_batch<F: EntityFields>(
    &self,
    owner_id: i64,
    requests: Vec<NewEntity<F>>,
  ) -> Result<Vec<Entity<F>>> {
    self
      .run(move |conn| repository::create_batch(conn, Some(owner_id), requests))
      .await
  }

  async fn get_entity<F: EntityFields>(&self, id: i64) -> Result<Option<Entity<F>>> {
    self.run(move |conn| repository::get(conn, id)).await
  }

  async fn list_entities<F: EntityFields>(&self) -> Result<Vec<Entity<F>>> {
    self.run(|conn| repository::list(conn)).await
  }

  async fn list_owned_entities<F: EntityFields>(&self, owner_id: i64) -> Result<Vec<Entity<F>>> {
    self.run(move |conn| repository::list_owned(conn, owner_id)).await
  }

  async fn update_entity<F: EntityFields>(
    &self,
    id: i64,
    request: NewEntity<F>,
  ) -> Result<Entity<F>> {
    self.run(move |conn| repository::update(conn, id, request)).await
  }

  async fn delete_entity<F: EntityFields>(&self, id: i64) -> Result<Entity<F>> {
    self.run(move |conn| repository::delete(conn, id)).await
  }

  async fn delete_all_entities<F: EntityFields>(&self) -> Result<u64> {
    self.run(|conn| repository::delete_all::<F>(conn)).await
  }

  async fn filter_options<F: EntityFields>(&self) -> Result<FilterOptions> {
    self.run(|conn| repository::filter_options::<F>(conn)).await
  }

  async fn search<F: EntityFields>(
    &self,
    query: &SearchQuery,
  ) -> Result<SearchPage<Entity<F>>> {
    let query = query.clone();
    self.run(move |conn| search::search(conn, &query)).await
  }

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn create_account(&self, input: NewAccount) -> Result<Account> {
    self
      .run(move |conn| {
        let tx = write_tx(conn)?;
        let account = accounts::create(&tx, input)?;
        tx.commit()?;
        Ok(account)
      })
      .await
  }

  async fn get_account(&self, id: i64) -> Result<Option<Account>> {
    self.run(move |conn| accounts::get(conn, id)).await
  }

  async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
    let email = email.to_owned();
    self.run(move |conn| accounts::get_by_email(conn, &email)).await
  }
}
