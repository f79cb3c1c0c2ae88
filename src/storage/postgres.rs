//! PostgreSQL storage backend: one JSONB `documents` table.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::storage::{StorageError, StorageInterface};

pub struct PgStorage {
    db: PgPool,
}

impl PgStorage {
    pub fn new(db: PgPool) -> Self { Self { db } }

    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let db = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        sqlx::migrate!("./migrations").run(&db).await.map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self::new(db))
    }
}

#[async_trait]
impl StorageInterface for PgStorage {
    async fn get_bytes(&self, collection: &str, id: &str) -> Result<Vec<u8>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT body::text FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection).bind(id).fetch_optional(&self.db).await?;
        row.map(|(body,)| body.into_bytes()).ok_or(StorageError::NotFound)
    }

    async fn set_bytes(&self, collection: &str, id: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let body = String::from_utf8(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        sqlx::query("INSERT INTO documents (collection, id, body, created_at, updated_at) VALUES ($1, $2, $3::jsonb, NOW(), NOW()) ON CONFLICT (collection, id) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()")
            .bind(collection).bind(id).bind(body).execute(&self.db).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection).bind(id).execute(&self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM documents WHERE collection = $1 AND id = $2)")
            .bind(collection).bind(id).fetch_one(&self.db).await?;
        Ok(exists)
    }

    async fn list_bytes(&self, collection: &str) -> Result<Vec<Vec<u8>>, StorageError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT body::text FROM documents WHERE collection = $1 ORDER BY seq")
            .bind(collection).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(|(body,)| body.into_bytes()).collect())
    }
}
