use thiserror::Error;

/// Errors produced by the store layer.
///
/// Raw SQLite errors are wrapped so callers depend on this domain type, not
/// on `rusqlite` error variants.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A natural key (MAC address, image tag, username) already exists.
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    /// The addressed record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
