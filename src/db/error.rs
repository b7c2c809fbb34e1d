//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
///
/// Constraint violations get their own variants so callers can tell a
/// duplicate `message_id` apart from a broken foreign key or a failed
/// CHECK — the pipeline's idempotency policy depends on that distinction.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// A UNIQUE (or primary key) constraint was violated.
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A FOREIGN KEY constraint was violated.
    #[error("Foreign key constraint violation: {0}")]
    ForeignKeyViolation(String),

    /// A CHECK constraint was violated.
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

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

    /// A stored JSON value could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, ref msg) = e {
            let detail = || msg.clone().unwrap_or_else(|| err.to_string());
            match err.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return DatabaseError::UniqueViolation(detail());
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return DatabaseError::ForeignKeyViolation(detail());
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => {
                    return DatabaseError::CheckViolation(detail());
                }
                _ => {}
            }
        }
        DatabaseError::Sqlite(e)
    }
}

impl DatabaseError {
    /// Whether retrying the operation could plausibly succeed.
    ///
    /// Constraint violations and corrupt data are deterministic; lock
    /// contention and transient SQLite failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            DatabaseError::Sqlite(_) => false,
            DatabaseError::UniqueViolation(_)
            | DatabaseError::ForeignKeyViolation(_)
            | DatabaseError::CheckViolation(_)
            | DatabaseError::Serialization(_)
            | DatabaseError::Migration { .. }
            | DatabaseError::LockPoisoned => false,
            DatabaseError::Io { .. } => true,
        }
    }
}
