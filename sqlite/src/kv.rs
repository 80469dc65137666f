//! SQLite implementation of the key-value backend.

use crate::pool::Pool;
use async_trait::async_trait;
use datastore_engine::{error::Result, Error, KeyError, KvBackend};

/// Key-value backend over the `kv` table.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: Pool,
}

impl SqliteBackend {
    /// Wrap a pool whose migrations have already run.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn backend_error(err: sqlx::Error) -> Error {
    Error::Backend(err.to_string())
}

const UPSERT: &str = r#"
    INSERT INTO kv (key, value) VALUES (?, ?)
    ON CONFLICT (key) DO UPDATE SET value = excluded.value
"#;

#[async_trait]
impl KvBackend for SqliteBackend {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let mut conn = self.pool.acquire().await.map_err(backend_error)?;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut *conn)
                .await
                .map_err(backend_error)?;
            values.push((key.clone(), value));
        }
        Ok(values)
    }

    async fn multi_set(&self, pairs: Vec<(String, String)>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;

        // Keep going after a failed row so every rejected key is reported.
        let mut errors = Vec::new();
        for (key, value) in pairs {
            let written = sqlx::query(UPSERT)
                .bind(&key)
                .bind(value)
                .execute(&mut *tx)
                .await;
            if let Err(err) = written {
                errors.push(KeyError::new(key, err.to_string()));
            }
        }

        if !errors.is_empty() {
            tx.rollback().await.map_err(backend_error)?;
            return Err(Error::BatchWrite(errors));
        }

        tx.commit().await.map_err(backend_error)
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;
        for key in keys {
            sqlx::query("DELETE FROM kv WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(backend_error)?;
        }
        tx.commit().await.map_err(backend_error)
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT key FROM kv ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)
    }
}
