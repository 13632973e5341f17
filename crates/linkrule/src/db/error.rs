//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A natural-key constraint rejected the write.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    /// Maps UNIQUE-constraint violations to [`DatabaseError::Duplicate`].
    pub(crate) fn from_write(e: rusqlite::Error, what: &str) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Duplicate(what.to_string())
            }
            other => Self::Sqlite(other),
        }
    }
}
