//! Handlers shared by every tagged-entity collection.
//!
//! Each handler is generic over the store `S` and the payload `F`; the router
//! instantiates them once per entity kind.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/api/{entity}/` | Body: array of create requests; 201 |
//! | `GET`    | `/api/{entity}/my/` | Owned kinds only; bearer token |
//! | `GET`    | `/api/{entity}/` | Fixed sort order |
//! | `DELETE` | `/api/{entity}/` | `{"deleted": n}` |
//! | `GET`    | `/api/{entity}/{id}` | 404 if not found |
//! | `PUT`    | `/api/{entity}/{id}` | Full replacement |
//! | `DELETE` | `/api/{entity}/{id}` | Returns the deleted entity |
//! | `GET`    | `/api/{entity}/filter/` | Options per tag slot |
//! | `POST`   | `/api/{entity}/search/?page=n` | Body: search request |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rondas_core::{
  entity::{Entity, EntityFields, FilterOptions, NewEntity},
  search::{SearchPage, SearchQuery, SearchRequest},
  stakeholder::CollectorFields,
  store::ExchangeStore,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
  AppState,
  auth::{CrawlerKey, CurrentAccount},
  error::ApiError,
  extract::{JsonBody, PathParam, QueryParams},
};

// ─── Collection ──────────────────────────────────────────────────────────────

/// `POST /api/{entity}/`
pub async fn create<S, F>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<Vec<NewEntity<F>>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let created = state.store.create_batch(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /api/{entity}/` for kinds created on behalf of an account.
pub async fn create_owned<S, F>(
  CurrentAccount(account): CurrentAccount,
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<Vec<NewEntity<F>>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let created = state
    .store
    .create_owned_batch(account.id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/{entity}/`
pub async fn list<S, F>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Entity<F>>>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let entities = state.store.list_entities::<F>().await.map_err(ApiError::store)?;
  Ok(Json(entities))
}

/// `GET /api/{entity}/my/`
pub async fn list_owned<S, F>(
  CurrentAccount(account): CurrentAccount,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Entity<F>>>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let entities = state
    .store
    .list_owned_entities::<F>(account.id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entities))
}

/// `DELETE /api/{entity}/`
pub async fn delete_all<S, F>(
  State(state): State<AppState<S>>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let deleted = state
    .store
    .delete_all_entities::<F>()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "deleted": deleted })))
}

// ─── Single entity ───────────────────────────────────────────────────────────

/// `GET /api/{entity}/{id}`
pub async fn get_one<S, F>(
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<i64>,
) -> Result<Json<Entity<F>>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let entity = state
    .store
    .get_entity::<F>(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("{} {id} not found", F::KIND.label())))?;
  Ok(Json(entity))
}

/// `PUT /api/{entity}/{id}`
pub async fn update<S, F>(
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<i64>,
  JsonBody(body): JsonBody<NewEntity<F>>,
) -> Result<Json<Entity<F>>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let entity = state.store.update_entity(id, body).await.map_err(ApiError::store)?;
  Ok(Json(entity))
}

/// `DELETE /api/{entity}/{id}`
pub async fn delete_one<S, F>(
  State(state): State<AppState<S>>,
  PathParam(id): PathParam<i64>,
) -> Result<Json<Entity<F>>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let entity = state
    .store
    .delete_entity::<F>(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entity))
}

// ─── Filters and search ──────────────────────────────────────────────────────

/// `GET /api/{entity}/filter/`
pub async fn filter_options<S, F>(
  State(state): State<AppState<S>>,
) -> Result<Json<FilterOptions>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let options = state
    .store
    .filter_options::<F>()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(options))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
  #[serde(default)]
  pub page: usize,
}

/// `POST /api/{entity}/search/?page=<n>`
pub async fn search<S, F>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<PageParams>,
  JsonBody(body): JsonBody<SearchRequest>,
) -> Result<Json<SearchPage<Entity<F>>>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  let query =
    SearchQuery::from_request(F::KIND, body, params.page, state.config.items_per_page)?;
  let page = state.store.search::<F>(&query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Crawler ingestion ───────────────────────────────────────────────────────

/// `POST /api/crawler/collectors/`, gated by `X-API-KEY`.
pub async fn ingest_collectors<S>(
  _key: CrawlerKey,
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<Vec<NewEntity<CollectorFields>>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ExchangeStore + Clone + 'static,
{
  tracing::info!(count = body.len(), "crawler ingestion");
  let created = state.store.create_batch(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(created)))
}
