//! Handlers for `/api/accounts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/accounts/register/` | 400 if the email is taken |
//! | `POST` | `/api/accounts/login/` | 404 unknown email, 401 wrong password |
//! | `POST` | `/api/accounts/refresh/` | Body: `{"refresh_token": "..."}` |
//! | `GET`  | `/api/accounts/me/` | Bearer access token |

use axum::{Json, extract::State};
use rondas_core::{
  account::{Account, NewAccount, normalize_email, validate_registration},
  store::ExchangeStore,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::{CurrentAccount, TokenPair, hash_password, verify_password},
  error::ApiError,
  extract::JsonBody,
};

/// Body of every token-issuing endpoint.
#[derive(Debug, Serialize)]
pub struct Authenticated {
  pub user:   Account,
  #[serde(flatten)]
  pub tokens: TokenPair,
}

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterBody {
  pub email:        String,
  pub display_name: String,
  #[serde(default)]
  pub phone:        Option<String>,
  pub password:     String,
}

/// `POST /api/accounts/register/`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<RegisterBody>,
) -> Result<Json<Authenticated>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
{
  validate_registration(&body.email, &body.display_name, &body.password)?;
  let password_hash = hash_password(&body.password)?;

  let user = state
    .store
    .create_account(NewAccount {
      email: normalize_email(&body.email),
      display_name: body.display_name,
      phone: body.phone,
      password_hash,
    })
    .await
    .map_err(ApiError::store)?;

  let tokens = state.auth.issue(&user)?;
  Ok(Json(Authenticated { user, tokens }))
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

/// `POST /api/accounts/login/`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<LoginBody>,
) -> Result<Json<Authenticated>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
{
  let user = state
    .store
    .get_account_by_email(&body.email)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

  if !verify_password(&body.password, &user.password_hash) {
    tracing::debug!(account = user.id, "wrong password");
    return Err(ApiError::unauthorized("Incorrect password"));
  }

  let tokens = state.auth.issue(&user)?;
  Ok(Json(Authenticated { user, tokens }))
}

// ─── Refresh ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
  pub refresh_token: String,
}

/// `POST /api/accounts/refresh/`
pub async fn refresh<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<RefreshBody>,
) -> Result<Json<Authenticated>, ApiError>
where
  S: ExchangeStore + Clone + 'static,
{
  let claims = state.auth.verify_refresh(&body.refresh_token)?;
  let user = state
    .store
    .get_account(claims.id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;

  let tokens = state.auth.issue(&user)?;
  Ok(Json(Authenticated { user, tokens }))
}

// ─── Me ──────────────────────────────────────────────────────────────────────

/// `GET /api/accounts/me/`
pub async fn me(CurrentAccount(account): CurrentAccount) -> Json<Account> { Json(account) }
