//! # muster-store
//!
//! SQLite-backed registry store for the muster fleet backend. Owns every
//! persisted Client, VMImage and User record plus the client/image
//! association table, and is the only component allowed to mutate them.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! [`rusqlite::Connection`] and provides typed CRUD helpers for every
//! domain model. Each mutating helper runs inside its own scoped
//! transaction: the transaction commits on success and rolls back on every
//! error path, so a failed write never leaves a client row without its
//! association rows.

pub mod clients;
pub mod database;
pub mod images;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
