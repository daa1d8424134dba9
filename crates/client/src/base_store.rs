//! Durable base-content store.
//!
//! Holds, per path, the last content this client and the server agreed on;
//! it is the `base` side of every three-way merge. An embedded SQLite file
//! is the source of truth, with a small in-memory hot window in front.
//!
//! Failure policy: a broken store degrades to a cache miss, never to a
//! failed sync. Every operation logs and carries on.

use std::path::Path;
use std::time::Duration;

use moka::sync::Cache;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, warn};

/// Entries kept hot in memory.
const HOT_WINDOW: u64 = 100;

/// Unused entries older than this are swept by [`BaseContentStore::cleanup`].
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(90 * 24 * 60 * 60);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS base_content (
    path TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    accessed_at INTEGER NOT NULL
)
"#;

#[derive(Clone)]
pub struct BaseContentStore {
    /// `None` when the durable store failed to open; everything then runs
    /// hot-window-only.
    pool: Option<SqlitePool>,
    hot: Cache<String, String>,
}

impl std::fmt::Debug for BaseContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseContentStore")
            .field("durable", &self.pool.is_some())
            .finish()
    }
}

impl BaseContentStore {
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, "base store directory not writable, degrading to memory-only");
                return Self::degraded();
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        match Self::connect(options).await {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "base store unavailable, degrading to memory-only");
                Self::degraded()
            }
        }
    }

    pub async fn in_memory() -> Self {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        match Self::connect(options).await {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "in-memory base store failed");
                Self::degraded()
            }
        }
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self {
            pool: Some(pool),
            hot: Self::hot_window(),
        })
    }

    fn degraded() -> Self {
        Self {
            pool: None,
            hot: Self::hot_window(),
        }
    }

    fn hot_window() -> Cache<String, String> {
        Cache::builder().max_capacity(HOT_WINDOW).build()
    }

    /// Hot hit bumps recency; a miss reads the durable store, warms the
    /// window, and refreshes `accessed_at` off the critical path.
    pub async fn get(&self, path: &str) -> Option<String> {
        if let Some(content) = self.hot.get(path) {
            return Some(content);
        }
        let pool = self.pool.as_ref()?;

        let row = sqlx::query("SELECT content FROM base_content WHERE path = ?1")
            .bind(path)
            .fetch_optional(pool)
            .await;
        match row {
            Ok(Some(row)) => {
                let content: String = row.get("content");
                self.hot.insert(path.to_owned(), content.clone());
                self.touch_async(path);
                Some(content)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(path, error = %e, "base store read failed");
                None
            }
        }
    }

    fn touch_async(&self, path: &str) {
        let Some(pool) = self.pool.clone() else {
            return;
        };
        let path = path.to_owned();
        let now = now_millis();
        tokio::spawn(async move {
            if let Err(e) = sqlx::query("UPDATE base_content SET accessed_at = ?1 WHERE path = ?2")
                .bind(now)
                .bind(&path)
                .execute(&pool)
                .await
            {
                debug!(path, error = %e, "base store access-time refresh failed");
            }
        });
    }

    /// Write-through with the current time.
    pub async fn set(&self, path: &str, content: &str) {
        self.hot.insert(path.to_owned(), content.to_owned());
        let Some(pool) = &self.pool else {
            return;
        };
        if let Err(e) = sqlx::query(
            r#"
            INSERT INTO base_content (path, content, accessed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (path) DO UPDATE SET
                content = excluded.content,
                accessed_at = excluded.accessed_at
            "#,
        )
        .bind(path)
        .bind(content)
        .bind(now_millis())
        .execute(pool)
        .await
        {
            warn!(path, error = %e, "base store write failed");
        }
    }

    pub async fn delete(&self, path: &str) {
        self.hot.invalidate(path);
        let Some(pool) = &self.pool else {
            return;
        };
        if let Err(e) = sqlx::query("DELETE FROM base_content WHERE path = ?1")
            .bind(path)
            .execute(pool)
            .await
        {
            warn!(path, error = %e, "base store delete failed");
        }
    }

    pub async fn has(&self, path: &str) -> bool {
        if self.hot.contains_key(path) {
            return true;
        }
        let Some(pool) = &self.pool else {
            return false;
        };
        sqlx::query("SELECT 1 AS one FROM base_content WHERE path = ?1")
            .bind(path)
            .fetch_optional(pool)
            .await
            .map(|row| row.is_some())
            .unwrap_or(false)
    }

    pub async fn clear(&self) {
        self.hot.invalidate_all();
        let Some(pool) = &self.pool else {
            return;
        };
        if let Err(e) = sqlx::query("DELETE FROM base_content").execute(pool).await {
            warn!(error = %e, "base store clear failed");
        }
    }

    /// Sweep entries not accessed within `max_age`.
    pub async fn cleanup(&self, max_age: Duration) {
        let Some(pool) = &self.pool else {
            return;
        };
        let cutoff = now_millis() - max_age.as_millis() as i64;
        match sqlx::query("DELETE FROM base_content WHERE accessed_at < ?1")
            .bind(cutoff)
            .execute(pool)
            .await
        {
            Ok(result) => {
                if result.rows_affected() > 0 {
                    debug!(swept = result.rows_affected(), "base store cleanup");
                    self.hot.invalidate_all();
                }
            }
            Err(e) => warn!(error = %e, "base store cleanup failed"),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
