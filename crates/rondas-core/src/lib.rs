//! Core types and trait definitions for the Rondas material exchange.
//!
//! This crate is free of HTTP and database dependencies.
//! The store backend and the HTTP layer both depend on it.

pub mod account;
pub mod building_element;
pub mod entity;
pub mod error;
pub mod search;
pub mod stakeholder;
pub mod store;
pub mod taxonomy;

pub use error::{Error, Result};
