//! Token issuance, password hashing, and the bearer / API-key extractors.
//!
//! Access and refresh tokens are HS256 JWTs carrying `{id, email, exp}`.
//! They are signed with distinct secrets, so one can never stand in for the
//! other.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use rondas_core::{account::Account, store::ExchangeStore};
use serde::{Deserialize, Serialize};

use crate::{AppState, ServerConfig, error::ApiError};

/// Header carrying the crawler API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// Signing material and lifetimes for both token kinds.
#[derive(Clone)]
pub struct AuthConfig {
  pub access_secret:  String,
  pub access_ttl:     Duration,
  pub refresh_secret: String,
  pub refresh_ttl:    Duration,
}

impl AuthConfig {
  pub fn from_config(config: &ServerConfig) -> Self {
    Self {
      access_secret:  config.jwt_secret_key.clone(),
      access_ttl:     Duration::minutes(config.jwt_expire_minutes),
      refresh_secret: config.jwt_refresh_secret_key.clone(),
      refresh_ttl:    Duration::minutes(config.jwt_refresh_expire_minutes),
    }
  }

  /// Issue a fresh access/refresh pair for `account`.
  pub fn issue(&self, account: &Account) -> Result<TokenPair, ApiError> {
    let (access_token, expires_at) = sign(account, &self.access_secret, self.access_ttl)?;
    let (refresh_token, _) = sign(account, &self.refresh_secret, self.refresh_ttl)?;
    Ok(TokenPair { access_token, refresh_token, expires_at })
  }

  pub fn verify_access(&self, token: &str) -> Result<Claims, ApiError> {
    verify(token, &self.access_secret)
  }

  pub fn verify_refresh(&self, token: &str) -> Result<Claims, ApiError> {
    verify(token, &self.refresh_secret)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub id:    i64,
  pub email: String,
  /// Unix timestamp, seconds.
  pub exp:   i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
  pub access_token:  String,
  pub refresh_token: String,
  /// Expiry of the access token as a Unix timestamp.
  pub expires_at:    i64,
}

fn sign(account: &Account, secret: &str, ttl: Duration) -> Result<(String, i64), ApiError> {
  let exp = (Utc::now() + ttl).timestamp();
  let claims = Claims { id: account.id, email: account.email.clone(), exp };
  let token = jsonwebtoken::encode(
    &Header::new(Algorithm::HS256),
    &claims,
    &EncodingKey::from_secret(secret.as_bytes()),
  )
  .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))?;
  Ok((token, exp))
}

fn verify(token: &str, secret: &str) -> Result<Claims, ApiError> {
  jsonwebtoken::decode::<Claims>(
    token,
    &DecodingKey::from_secret(secret.as_bytes()),
    &Validation::new(Algorithm::HS256),
  )
  .map(|data| data.claims)
  .map_err(|e| {
    tracing::debug!(error = %e, "rejected token");
    ApiError::unauthorized(INVALID_CREDENTIALS)
  })
}

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Argon2 PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash)
    .map(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
    .unwrap_or(false)
}

// ─── Extractors ──────────────────────────────────────────────────────────────

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
}

/// The account named by a valid bearer access token.
pub struct CurrentAccount(pub Account);

impl<S> FromRequestParts<AppState<S>> for CurrentAccount
where
  S: ExchangeStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)
      .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;
    let claims = state.auth.verify_access(token)?;
    let account = state
      .store
      .get_account(claims.id)
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;
    Ok(CurrentAccount(account))
  }
}

/// Zero-size marker: the request carried the configured crawler API key.
pub struct CrawlerKey;

impl<S> FromRequestParts<AppState<S>> for CrawlerKey
where
  S: ExchangeStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let presented = parts
      .headers
      .get(API_KEY_HEADER)
      .and_then(|v| v.to_str().ok());
    match presented {
      Some(key) if key == state.config.allowed_api_key => Ok(CrawlerKey),
      _ => {
        tracing::debug!("rejected crawler request without a valid API key");
        Err(ApiError::unauthorized("Invalid API key"))
      }
    }
  }
}
