use sqlx::Row;

use crate::database::{now_millis, Database};

/// Metadata for one content-addressed attachment. The bytes live in object
/// storage under `object_key`.
#[derive(Debug, Clone)]
pub struct AttachmentRow {
    pub id: String,
    pub vault_id: String,
    pub path: String,
    pub content_type: String,
    pub size: i64,
    pub hash: String,
    pub object_key: String,
    pub deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One row of the attachment change feed.
#[derive(Debug, Clone)]
pub struct AttachmentChangeRow {
    pub seq: i64,
    pub attachment_id: String,
    pub vault_id: String,
    pub path: String,
    pub hash: String,
    pub deleted: bool,
    pub created_at: i64,
}

impl Database {
    pub async fn get_attachment(
        &self,
        id: &str,
        vault_id: &str,
    ) -> Result<Option<AttachmentRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, vault_id, path, content_type, size, hash, object_key,
                   deleted, created_at, updated_at
            FROM attachments
            WHERE vault_id = ?1 AND id = ?2
            "#,
        )
        .bind(vault_id)
        .bind(id)
        .fetch_optional(&**self)
        .await?;

        Ok(row.map(|r| row_to_attachment(&r)))
    }

    /// Insert or revive an attachment and append its change-feed entry in
    /// one transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_attachment(
        &self,
        id: &str,
        vault_id: &str,
        path: &str,
        content_type: &str,
        size: i64,
        hash: &str,
        object_key: &str,
    ) -> Result<(), sqlx::Error> {
        let now = now_millis();

        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO attachments (
                id, vault_id, path, content_type, size, hash, object_key,
                deleted, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
            ON CONFLICT (vault_id, id) DO UPDATE SET
                path = excluded.path,
                content_type = excluded.content_type,
                size = excluded.size,
                deleted = 0,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(vault_id)
        .bind(path)
        .bind(content_type)
        .bind(size)
        .bind(hash)
        .bind(object_key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO attachment_changes (attachment_id, vault_id, path, hash, deleted, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            "#,
        )
        .bind(id)
        .bind(vault_id)
        .bind(path)
        .bind(hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Soft delete; the blob object stays (other paths may share the hash).
    pub async fn soft_delete_attachment(
        &self,
        id: &str,
        vault_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let existing = match self.get_attachment(id, vault_id).await? {
            Some(row) => row,
            None => return Ok(false),
        };

        let now = now_millis();
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            UPDATE attachments SET deleted = 1, updated_at = ?1
            WHERE vault_id = ?2 AND id = ?3
            "#,
        )
        .bind(now)
        .bind(vault_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO attachment_changes (attachment_id, vault_id, path, hash, deleted, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            "#,
        )
        .bind(id)
        .bind(vault_id)
        .bind(&existing.path)
        .bind(&existing.hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Attachment feed rows with `seq > since`, ascending, at most `limit`.
    pub async fn get_attachment_changes(
        &self,
        vault_id: &str,
        since: i64,
        limit: i64,
    ) -> Result<(Vec<AttachmentChangeRow>, i64), sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT seq, attachment_id, vault_id, path, hash, deleted, created_at
            FROM attachment_changes
            WHERE vault_id = ?1 AND seq > ?2
            ORDER BY seq ASC
            LIMIT ?3
            "#,
        )
        .bind(vault_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&**self)
        .await?;

        let changes: Vec<AttachmentChangeRow> = rows
            .iter()
            .map(|r| AttachmentChangeRow {
                seq: r.get("seq"),
                attachment_id: r.get("attachment_id"),
                vault_id: r.get("vault_id"),
                path: r.get("path"),
                hash: r.get("hash"),
                deleted: r.get::<i64, _>("deleted") != 0,
                created_at: r.get("created_at"),
            })
            .collect();
        let last_seq = changes.last().map_or(since, |c| c.seq);
        Ok((changes, last_seq))
    }

    /// Largest attachment-change seq for a vault (0 when it has none).
    pub async fn latest_attachment_seq(&self, vault_id: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT COALESCE(MAX(seq), 0) AS tip FROM attachment_changes WHERE vault_id = ?1"#,
        )
        .bind(vault_id)
        .fetch_one(&**self)
        .await?;
        Ok(row.get("tip"))
    }

    pub async fn count_attachments(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM attachments")
            .fetch_one(&**self)
            .await?;
        Ok(row.get("count"))
    }
}

fn row_to_attachment(row: &sqlx::sqlite::SqliteRow) -> AttachmentRow {
    AttachmentRow {
        id: row.get("id"),
        vault_id: row.get("vault_id"),
        path: row.get("path"),
        content_type: row.get("content_type"),
        size: row.get("size"),
        hash: row.get("hash"),
        object_key: row.get("object_key"),
        deleted: row.get::<i64, _>("deleted") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
