//! SQLite storage for documents, revisions, change feeds, attachment
//! metadata, and API keys. Blob bytes live in object storage, never here.

mod attachment_queries;
mod auth_queries;
mod document_queries;

pub use attachment_queries::{AttachmentChangeRow, AttachmentRow};
pub use document_queries::{ChangeRow, DocumentRow, RevisionRow};

use std::path::Path;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

/// Compile migrations at build time from the ./migrations directory.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Database connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl std::ops::Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

#[derive(Debug, Error)]
pub enum DatabaseSetupError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(String),
}

impl Database {
    /// Open (creating if missing) a file-backed database and run migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, DatabaseSetupError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseSetupError::Io(format!("failed to create database directory: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        MIGRATOR.run(&db.pool).await?;

        info!("database initialized at {:?}", path);
        Ok(db)
    }

    /// In-memory database for tests and ephemeral deployments.
    pub async fn in_memory() -> Result<Self, DatabaseSetupError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        // A single connection keeps the in-memory database alive and
        // serializes writers the way a file-backed pool would.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        MIGRATOR.run(&db.pool).await?;

        info!("database initialized in-memory");
        Ok(db)
    }
}

/// Millisecond wall time used for every created_at/updated_at column.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
