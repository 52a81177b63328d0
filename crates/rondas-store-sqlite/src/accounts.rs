//! Account persistence. Passwords arrive already hashed.

use chrono::Utc;
use rondas_core::{
  Error as CoreError,
  account::{Account, NewAccount, normalize_email},
};
use rusqlite::{Connection, OptionalExtension as _};

use crate::{
  Result,
  encode::{ACCOUNT_COLUMNS, RawAccount, encode_dt},
  error::is_constraint_violation,
};

fn already_registered() -> crate::Error {
  CoreError::validation("Email already registered").into()
}

pub fn create(conn: &Connection, input: NewAccount) -> Result<Account> {
  let email = normalize_email(&input.email);
  if get_by_email(conn, &email)?.is_some() {
    return Err(already_registered());
  }

  let now = encode_dt(Utc::now());
  let inserted = conn.execute(
    "INSERT INTO accounts (email, display_name, phone, password_hash, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    rusqlite::params![
      email,
      input.display_name.trim(),
      input.phone,
      input.password_hash,
      now
    ],
  );
  match inserted {
    Ok(_) => {}
    Err(e) if is_constraint_violation(&e) => return Err(already_registered()),
    Err(e) => return Err(e.into()),
  }

  let id = conn.last_insert_rowid();
  tracing::info!(id, "registered account");
  get(conn, id)?.ok_or_else(|| CoreError::Internal(format!("account {id} vanished")).into())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Account>> {
  conn
    .query_row(
      &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = ?1"),
      rusqlite::params![id],
      RawAccount::from_row,
    )
    .optional()?
    .map(RawAccount::into_account)
    .transpose()
}

pub fn get_by_email(conn: &Connection, email: &str) -> Result<Option<Account>> {
  conn
    .query_row(
      &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
      rusqlite::params![normalize_email(email)],
      RawAccount::from_row,
    )
    .optional()?
    .map(RawAccount::into_account)
    .transpose()
}
