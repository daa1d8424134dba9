use sqlx::Row;

use crate::database::{now_millis, Database};

impl Database {
    /// Store a freshly minted bearer key.
    pub async fn insert_api_key(&self, key: &str, label: Option<&str>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO api_keys (key, label, created_at) VALUES (?1, ?2, ?3)"#,
        )
        .bind(key)
        .bind(label)
        .bind(now_millis())
        .execute(&**self)
        .await?;
        Ok(())
    }

    pub async fn api_key_exists(&self, key: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(r#"SELECT COUNT(*) AS count FROM api_keys WHERE key = ?1"#)
            .bind(key)
            .fetch_one(&**self)
            .await?;
        Ok(row.get::<i64, _>("count") > 0)
    }
}
