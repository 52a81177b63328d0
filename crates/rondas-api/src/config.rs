//! Runtime server configuration.
//!
//! Deserialised by the `server` binary from an optional TOML file overlaid
//! with `RONDAS_*` environment variables.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                       String,
  #[serde(default = "default_port")]
  pub port:                       u16,
  #[serde(default = "default_database_path")]
  pub database_path:              PathBuf,
  /// Origin allowed by CORS, e.g. `http://localhost:3000`.
  pub frontend_url:               String,
  /// Value expected in the `X-API-KEY` header of crawler requests.
  pub allowed_api_key:            String,
  pub jwt_secret_key:             String,
  #[serde(default = "default_jwt_expire_minutes")]
  pub jwt_expire_minutes:         i64,
  pub jwt_refresh_secret_key:     String,
  #[serde(default = "default_jwt_refresh_expire_minutes")]
  pub jwt_refresh_expire_minutes: i64,
  /// Page size of every search endpoint.
  #[serde(default = "default_items_per_page")]
  pub items_per_page:             usize,
}

fn default_host() -> String { "0.0.0.0".into() }

fn default_port() -> u16 { 8000 }

fn default_database_path() -> PathBuf { PathBuf::from("rondas.db") }

fn default_jwt_expire_minutes() -> i64 { 15 }

fn default_jwt_refresh_expire_minutes() -> i64 { 60 * 24 * 7 }

fn default_items_per_page() -> usize { 20 }
