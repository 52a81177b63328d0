//! Request extractors whose rejections use the API error shape.

use axum::{
  extract::{FromRequest, FromRequestParts, Path, Query, Request},
  http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Like [`axum::Json`], but a malformed or mistyped body is a 400 with the
/// deserialiser's message rather than axum's plain-text 422.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
  S: Send + Sync,
  T: DeserializeOwned,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    axum::Json::<T>::from_request(req, state)
      .await
      .map(|axum::Json(value)| Self(value))
      .map_err(|rejection| ApiError::Validation(rejection.body_text()))
  }
}

/// [`Path`] with a JSON 400 rejection.
pub struct PathParam<T>(pub T);

impl<T, S> FromRequestParts<S> for PathParam<T>
where
  S: Send + Sync,
  T: DeserializeOwned + Send,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
    Path::<T>::from_request_parts(parts, state)
      .await
      .map(|Path(value)| Self(value))
      .map_err(|rejection| ApiError::Validation(rejection.body_text()))
  }
}

/// [`Query`] with a JSON 400 rejection.
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
  S: Send + Sync,
  T: DeserializeOwned,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
    Query::<T>::from_request_parts(parts, state)
      .await
      .map(|Query(value)| Self(value))
      .map_err(|rejection| ApiError::Validation(rejection.body_text()))
  }
}
