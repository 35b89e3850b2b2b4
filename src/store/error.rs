//! Error types for store operations.

use std::fmt;

use thiserror::Error;

use crate::db::DbError;

/// Structured classification for store/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// `SQLite` returned busy/locked after the busy timeout elapsed.
    BusyOrLocked,
    /// Constraint failure (unique/foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// A stored value could not be decoded.
    Decode,
    /// Filesystem or transport IO failure.
    Io,
    /// Unclassified database failure.
    Other,
}

impl StoreDbErrorKind {
    /// Classifies a driver error.
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Decode,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Decode => "decode",
            Self::Io => "io",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StoreDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StoreDbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StoreDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked") || message.contains("database table is locked") {
        return StoreDbErrorKind::BusyOrLocked;
    }

    StoreDbErrorKind::Other
}

/// Errors that can occur during store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Database operation failed; any open transaction was rolled back.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification of the failure.
        kind: StoreDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// Re-creating the schema failed.
    #[error("schema error: {message}")]
    Schema {
        /// Migration error text.
        message: String,
    },

    /// Reinitialization was requested without explicit confirmation.
    #[error(
        "reinitialization not confirmed\n  Suggestion: This deletes every set, card and link; pass --yes to confirm"
    )]
    ReinitNotConfirmed,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Connection(source) => Self::from(source),
            other => Self::Schema {
                message: other.to_string(),
            },
        }
    }
}

impl StoreError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Schema { .. } | Self::ReinitNotConfirmed => None,
        }
    }

    /// Returns true when this error is a database busy/locked condition.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        self.database_kind() == Some(StoreDbErrorKind::BusyOrLocked)
    }
}
