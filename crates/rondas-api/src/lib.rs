//! JSON REST API for the Rondas material exchange.
//!
//! Exposes an axum [`Router`] backed by any [`ExchangeStore`]. Every tagged
//! entity collection is served by the same generic handlers in
//! [`entities`], instantiated once per payload type.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod entities;
pub mod error;
pub mod extract;

use std::sync::Arc;

use axum::{
  Router,
  http::{HeaderValue, StatusCode},
  routing::{MethodRouter, get, post},
};
use rondas_core::{
  building_element::BuildingElementFields,
  entity::EntityFields,
  stakeholder::{CollectorFields, ContractorFields},
  store::ExchangeStore,
};
use tower_http::{
  cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
  trace::TraceLayer,
};

pub use config::ServerConfig;
pub use error::ApiError;

use auth::AuthConfig;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ExchangeStore> {
  pub store:  Arc<S>,
  pub auth:   Arc<AuthConfig>,
  pub config: Arc<ServerConfig>,
}

impl<S: ExchangeStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      store:  Arc::new(store),
      auth:   Arc::new(AuthConfig::from_config(&config)),
      config: Arc::new(config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router: entity collections, accounts, the
/// crawler ingestion endpoint and liveness checks.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ExchangeStore + Clone + 'static,
{
  let cors = cors_layer(&state.config.frontend_url);

  let app = Router::new()
    .route("/", get(health))
    .route("/api/healthcheck", get(health))
    // Accounts
    .route("/api/accounts/register/", post(accounts::register::<S>))
    .route("/api/accounts/login/",    post(accounts::login::<S>))
    .route("/api/accounts/refresh/",  post(accounts::refresh::<S>))
    .route("/api/accounts/me/",       get(accounts::me))
    // Crawler
    .route("/api/crawler/collectors/", post(entities::ingest_collectors::<S>));

  let app = entity_routes::<S, CollectorFields>(
    app,
    "collectors",
    post(entities::create::<S, CollectorFields>),
  );
  let app = entity_routes::<S, ContractorFields>(
    app,
    "contractors",
    post(entities::create::<S, ContractorFields>),
  );
  // Building elements belong to the account that posted them.
  let app = entity_routes::<S, BuildingElementFields>(
    app,
    "building-elements",
    post(entities::create_owned::<S, BuildingElementFields>),
  )
  .route(
    "/api/building-elements/my/",
    get(entities::list_owned::<S, BuildingElementFields>),
  );

  app
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .with_state(state)
}

/// Mount the generic entity handlers for `F` under `/api/{slug}`, with
/// `create` serving `POST /api/{slug}/`.
fn entity_routes<S, F>(
  app: Router<AppState<S>>,
  slug: &str,
  create: MethodRouter<AppState<S>>,
) -> Router<AppState<S>>
where
  S: ExchangeStore + Clone + 'static,
  F: EntityFields,
{
  app
    .route(
      &format!("/api/{slug}/"),
      create
        .get(entities::list::<S, F>)
        .delete(entities::delete_all::<S, F>),
    )
    .route(
      &format!("/api/{slug}/{{id}}"),
      get(entities::get_one::<S, F>)
        .put(entities::update::<S, F>)
        .delete(entities::delete_one::<S, F>),
    )
    .route(&format!("/api/{slug}/filter/"), get(entities::filter_options::<S, F>))
    .route(&format!("/api/{slug}/search/"), post(entities::search::<S, F>))
}

/// Credentialed CORS for the frontend origin. A wildcard cannot be combined
/// with credentials, so `*` disables CORS like any other unusable value.
fn cors_layer(frontend_url: &str) -> CorsLayer {
  let trimmed = frontend_url.trim().trim_end_matches('/');
  let origin = match HeaderValue::from_str(trimmed) {
    Ok(_) if trimmed == "*" => {
      tracing::warn!(frontend_url, "wildcard frontend url cannot carry credentials; CORS disabled");
      AllowOrigin::list([])
    }
    Ok(origin) => AllowOrigin::exact(origin),
    Err(_) => {
      tracing::warn!(frontend_url, "frontend url is not a valid origin; CORS disabled");
      AllowOrigin::list([])
    }
  };
  CorsLayer::new()
    .allow_origin(origin)
    .allow_methods(AllowMethods::mirror_request())
    .allow_headers(AllowHeaders::mirror_request())
    .allow_credentials(true)
}

/// `GET /` and `GET /api/healthcheck`
async fn health() -> StatusCode { StatusCode::OK }
