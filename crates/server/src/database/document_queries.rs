use sqlx::Row;

use crate::database::{now_millis, Database};

/// Current state of one document.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub doc_id: String,
    pub vault_id: String,
    pub content: Option<String>,
    pub rev: String,
    pub deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One historical revision of a document.
#[derive(Debug, Clone)]
pub struct RevisionRow {
    pub doc_id: String,
    pub vault_id: String,
    pub rev: String,
    pub content: Option<String>,
    pub deleted: bool,
    pub created_at: i64,
}

/// One row of the document change feed.
#[derive(Debug, Clone)]
pub struct ChangeRow {
    pub seq: i64,
    pub doc_id: String,
    pub vault_id: String,
    pub rev: String,
    pub deleted: bool,
    pub created_at: i64,
}

impl Database {
    /// Current state of a document, if it was ever written.
    pub async fn get_document(
        &self,
        doc_id: &str,
        vault_id: &str,
    ) -> Result<Option<DocumentRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT doc_id, vault_id, content, rev, deleted, created_at, updated_at
            FROM documents
            WHERE vault_id = ?1 AND doc_id = ?2
            "#,
        )
        .bind(vault_id)
        .bind(doc_id)
        .fetch_optional(&**self)
        .await?;

        Ok(row.map(|r| row_to_document(&r)))
    }

    /// Write a document's new state. The document row, its revision, and
    /// its change-feed entry commit as one transaction: the feed never
    /// references a revision that was not stored.
    pub async fn upsert_document(
        &self,
        doc_id: &str,
        vault_id: &str,
        content: Option<&str>,
        rev: &str,
        deleted: bool,
    ) -> Result<(), sqlx::Error> {
        let now = now_millis();
        let deleted_i = deleted as i64;

        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (doc_id, vault_id, content, rev, deleted, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT (vault_id, doc_id) DO UPDATE SET
                content = excluded.content,
                rev = excluded.rev,
                deleted = excluded.deleted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(doc_id)
        .bind(vault_id)
        .bind(content)
        .bind(rev)
        .bind(deleted_i)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO revisions (doc_id, vault_id, rev, content, deleted, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(doc_id)
        .bind(vault_id)
        .bind(rev)
        .bind(content)
        .bind(deleted_i)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO changes (doc_id, vault_id, rev, deleted, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(doc_id)
        .bind(vault_id)
        .bind(rev)
        .bind(deleted_i)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Soft delete: tombstone with no content.
    pub async fn delete_document(
        &self,
        doc_id: &str,
        vault_id: &str,
        rev: &str,
    ) -> Result<(), sqlx::Error> {
        self.upsert_document(doc_id, vault_id, None, rev, true).await
    }

    /// Look up one stored revision by its token.
    pub async fn get_revision(
        &self,
        doc_id: &str,
        vault_id: &str,
        rev: &str,
    ) -> Result<Option<RevisionRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT doc_id, vault_id, rev, content, deleted, created_at
            FROM revisions
            WHERE vault_id = ?1 AND doc_id = ?2 AND rev = ?3
            "#,
        )
        .bind(vault_id)
        .bind(doc_id)
        .bind(rev)
        .fetch_optional(&**self)
        .await?;

        Ok(row.map(|r| RevisionRow {
            doc_id: r.get("doc_id"),
            vault_id: r.get("vault_id"),
            rev: r.get("rev"),
            content: r.get("content"),
            deleted: r.get::<i64, _>("deleted") != 0,
            created_at: r.get("created_at"),
        }))
    }

    /// Feed rows with `seq > since`, ascending, at most `limit`. The second
    /// element is the batch's last seq, or `since` for an empty batch.
    pub async fn get_changes(
        &self,
        vault_id: &str,
        since: i64,
        limit: i64,
    ) -> Result<(Vec<ChangeRow>, i64), sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT seq, doc_id, vault_id, rev, deleted, created_at
            FROM changes
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

        let changes: Vec<ChangeRow> = rows.iter().map(row_to_change).collect();
        let last_seq = changes.last().map_or(since, |c| c.seq);
        Ok((changes, last_seq))
    }

    /// Largest document-change seq for a vault (0 when it has none).
    pub async fn latest_doc_seq(&self, vault_id: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT COALESCE(MAX(seq), 0) AS tip FROM changes WHERE vault_id = ?1"#,
        )
        .bind(vault_id)
        .fetch_one(&**self)
        .await?;
        Ok(row.get("tip"))
    }

    /// Delete revisions and change rows older than `cutoff_millis`, keeping
    /// anything that is still a document's latest revision or a vault's
    /// newest change for that document.
    pub async fn cleanup(&self, cutoff_millis: i64) -> Result<(u64, u64), sqlx::Error> {
        let revisions = sqlx::query(
            r#"
            DELETE FROM revisions
            WHERE created_at < ?1
              AND rev NOT IN (
                  SELECT rev FROM documents
                  WHERE documents.vault_id = revisions.vault_id
                    AND documents.doc_id = revisions.doc_id
              )
            "#,
        )
        .bind(cutoff_millis)
        .execute(&**self)
        .await?
        .rows_affected();

        let changes = sqlx::query(
            r#"
            DELETE FROM changes
            WHERE created_at < ?1
              AND seq NOT IN (
                  SELECT MAX(seq) FROM changes GROUP BY vault_id, doc_id
              )
            "#,
        )
        .bind(cutoff_millis)
        .execute(&**self)
        .await?
        .rows_affected();

        Ok((revisions, changes))
    }

    pub async fn count_documents(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM documents")
            .fetch_one(&**self)
            .await?;
        Ok(row.get("count"))
    }

    pub async fn count_revisions(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM revisions")
            .fetch_one(&**self)
            .await?;
        Ok(row.get("count"))
    }

    pub async fn count_changes(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM changes")
            .fetch_one(&**self)
            .await?;
        Ok(row.get("count"))
    }

    /// Global change-feed tips across all vaults, for admin stats.
    pub async fn global_seq_tips(&self) -> Result<(i64, i64), sqlx::Error> {
        let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) AS tip FROM changes")
            .fetch_one(&**self)
            .await?;
        let doc_tip: i64 = row.get("tip");
        let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) AS tip FROM attachment_changes")
            .fetch_one(&**self)
            .await?;
        let attachment_tip: i64 = row.get("tip");
        Ok((doc_tip, attachment_tip))
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> DocumentRow {
    DocumentRow {
        doc_id: row.get("doc_id"),
        vault_id: row.get("vault_id"),
        content: row.get("content"),
        rev: row.get("rev"),
        deleted: row.get::<i64, _>("deleted") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_change(row: &sqlx::sqlite::SqliteRow) -> ChangeRow {
    ChangeRow {
        seq: row.get("seq"),
        doc_id: row.get("doc_id"),
        vault_id: row.get("vault_id"),
        rev: row.get("rev"),
        deleted: row.get::<i64, _>("deleted") != 0,
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_appends_revision_and_change() {
        let db = Database::in_memory().await.unwrap();

        db.upsert_document("notes/a", "default", Some("one"), "1-x", false)
            .await
            .unwrap();
        db.upsert_document("notes/a", "default", Some("two"), "2-y", false)
            .await
            .unwrap();

        let doc = db.get_document("notes/a", "default").await.unwrap().unwrap();
        assert_eq!(doc.rev, "2-y");
        assert_eq!(doc.content.as_deref(), Some("two"));
        assert_eq!(db.count_revisions().await.unwrap(), 2);
        assert_eq!(db.count_changes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn change_feed_is_ordered_and_bounded() {
        let db = Database::in_memory().await.unwrap();
        for i in 0..5 {
            db.upsert_document(
                &format!("doc{i}"),
                "default",
                Some("x"),
                &format!("1-r{i}"),
                false,
            )
            .await
            .unwrap();
        }

        let (batch, last) = db.get_changes("default", 0, 3).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.windows(2).all(|w| w[0].seq < w[1].seq));
        assert_eq!(last, batch[2].seq);

        let (rest, rest_last) = db.get_changes("default", last, 100).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest[0].seq > last);
        assert_eq!(db.latest_doc_seq("default").await.unwrap(), rest_last);
    }

    #[tokio::test]
    async fn empty_feed_echoes_since() {
        let db = Database::in_memory().await.unwrap();
        let (batch, last) = db.get_changes("default", 7, 10).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(last, 7);
    }

    #[tokio::test]
    async fn vaults_are_isolated() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_document("doc", "alpha", Some("a"), "1-a", false)
            .await
            .unwrap();
        db.upsert_document("doc", "beta", Some("b"), "1-b", false)
            .await
            .unwrap();

        let (alpha, _) = db.get_changes("alpha", 0, 100).await.unwrap();
        assert_eq!(alpha.len(), 1);
        assert_eq!(alpha[0].rev, "1-a");
        assert!(db.get_document("doc", "beta").await.unwrap().unwrap().content
            == Some("b".to_owned()));
    }

    #[tokio::test]
    async fn delete_is_a_tombstone() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_document("doc", "default", Some("x"), "1-a", false)
            .await
            .unwrap();
        db.delete_document("doc", "default", "2-b").await.unwrap();

        let doc = db.get_document("doc", "default").await.unwrap().unwrap();
        assert!(doc.deleted);
        assert!(doc.content.is_none());
        let (changes, _) = db.get_changes("default", 0, 10).await.unwrap();
        assert!(changes[1].deleted);
    }

    #[tokio::test]
    async fn cleanup_never_drops_latest_revision() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_document("doc", "default", Some("v1"), "1-a", false)
            .await
            .unwrap();
        db.upsert_document("doc", "default", Some("v2"), "2-b", false)
            .await
            .unwrap();

        // Cutoff in the future: everything is "old enough".
        let (revs, _) = db.cleanup(now_millis() + 1_000).await.unwrap();
        assert_eq!(revs, 1);
        assert!(db
            .get_revision("doc", "default", "2-b")
            .await
            .unwrap()
            .is_some());
        assert!(db
            .get_revision("doc", "default", "1-a")
            .await
            .unwrap()
            .is_none());
    }
}
