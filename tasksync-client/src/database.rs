use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tasksync_core::{errors::ClientError, SyncResult};

use crate::queries::Queries;
use crate::storage::KeyValueStore;

pub(crate) fn storage_error(err: sqlx::Error) -> ClientError {
    ClientError::Storage(err.to_string())
}

/// SQLite-backed key-value store holding the persisted collections.
pub struct ClientDatabase {
    pub pool: SqlitePool,
}

impl ClientDatabase {
    pub async fn new(database_url: &str) -> SyncResult<Self> {
        // Every connection to an in-memory database opens a fresh one.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(storage_error)?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> SyncResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn count_keys(&self) -> SyncResult<i64> {
        sqlx::query_scalar::<_, i64>(Queries::COUNT_KEYS)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }
}

#[async_trait]
impl KeyValueStore for ClientDatabase {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let row = sqlx::query(Queries::GET_VALUE)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        match row {
            Some(row) => Ok(Some(row.try_get("value").map_err(storage_error)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        sqlx::query(Queries::UPSERT_VALUE)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        sqlx::query(Queries::DELETE_VALUE)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}
