//! Database connection and schema management.
//!
//! This module provides SQLite database connectivity with:
//! - Connection pool management
//! - WAL mode so deck validation can read while an ingestion run writes
//! - Foreign key enforcement (`cards.set_code` → `sets.code`)
//! - Automatic migration execution
//!
//! # Example
//!
//! ```no_run
//! use mtgdb_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("mtg_cards.db")).await?;
//! // Hand `db` to CardStore / LinkRegistry / DeckValidator...
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in milliseconds.
/// Connections will wait this long for a competing writer before returning SQLITE_BUSY.
const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Failed to create the directory holding the database file.
    #[error("failed to create database directory {path}: {source}")]
    Directory {
        /// Directory that could not be created.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Pool tuning for file-backed databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Busy timeout applied to every pooled connection.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Database connection wrapper with connection pool.
///
/// This is the explicit store handle: every component that touches the
/// store receives a clone of it instead of reaching for a global.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `db_path` with default options.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        Self::new_with_options(db_path, DatabaseOptions::default()).await
    }

    /// Opens the database at `db_path` with explicit pool options.
    ///
    /// This will:
    /// 1. Create the parent directory and database file if they don't exist
    /// 2. Enable WAL mode, foreign keys and the busy timeout on every connection
    /// 3. Run any pending migrations
    ///
    /// # Errors
    ///
    /// Returns `DbError::Directory` if the parent directory cannot be created,
    /// `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new_with_options(
        db_path: &Path,
        options: DatabaseOptions,
    ) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DbError::Directory {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let connect_options = SqliteConnectOptions::from_str(&format!(
            "sqlite:{}",
            db_path.display()
        ))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(u64::from(options.busy_timeout_ms)));

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections.max(1))
            .connect_with(connect_options)
            .await?;

        MIGRATOR.run(&pool).await?;
        debug!(
            max_connections = options.max_connections,
            "database ready"
        );

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// The database exists only for the lifetime of the pool. A single
    /// connection is used so every query sees the same in-memory file.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;

        MIGRATOR.run(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Re-applies the embedded migrations.
    ///
    /// Used after a destructive reinitialization dropped the schema together
    /// with the migration ledger.
    pub(crate) async fn run_migrations(&self) -> Result<(), DbError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.eq_ignore_ascii_case("wal"))
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}
