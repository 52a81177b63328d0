//! Accounts that authenticate against the API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Error, Result};

/// A registered account. The password hash never leaves the store layer in
/// serialised form.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
  pub id:                i64,
  pub email:             String,
  pub display_name:      String,
  pub phone:             Option<String>,
  pub is_email_verified: bool,
  #[serde(skip_serializing)]
  pub password_hash:     String,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// Input to [`crate::store::ExchangeStore::create_account`]. The password is
/// already hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub email:         String,
  pub display_name:  String,
  pub phone:         Option<String>,
  pub password_hash: String,
}

pub const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=50;
pub const DISPLAY_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=100;

/// Canonical form of an email address for lookup and uniqueness.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

/// Shape checks applied before a registration touches the store.
pub fn validate_registration(
  email: &str,
  display_name: &str,
  password: &str,
) -> Result<()> {
  let email = email.trim();
  let well_formed = email
    .split_once('@')
    .is_some_and(|(local, domain)| {
      !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
    });
  if !well_formed || email.chars().any(char::is_whitespace) {
    return Err(Error::validation(format!("`{email}` is not a valid email address")));
  }

  let name_len = display_name.trim().chars().count();
  if !DISPLAY_NAME_LEN.contains(&name_len) {
    return Err(Error::validation(format!(
      "display name must be between {} and {} characters",
      DISPLAY_NAME_LEN.start(),
      DISPLAY_NAME_LEN.end()
    )));
  }

  if !PASSWORD_LEN.contains(&password.chars().count()) {
    return Err(Error::validation(format!(
      "password must be between {} and {} characters",
      PASSWORD_LEN.start(),
      PASSWORD_LEN.end()
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_reasonable_registration() {
    assert!(validate_registration("ana@example.fr", "Ana", "correct horse").is_ok());
  }

  #[test]
  fn rejects_malformed_email() {
    for email in ["", "ana", "ana@", "@example.fr", "ana@example", "a na@example.fr"] {
      assert!(validate_registration(email, "Ana", "correct horse").is_err(), "{email}");
    }
  }

  #[test]
  fn rejects_short_password_and_name() {
    assert!(validate_registration("ana@example.fr", "Ana", "short").is_err());
    assert!(validate_registration("ana@example.fr", "An", "correct horse").is_err());
  }

  #[test]
  fn email_normalisation() {
    assert_eq!(normalize_email("  Ana@Example.FR "), "ana@example.fr");
  }
}
