//! SQLite session cache.
//!
//! Implements `SessionStore` from `tungs-core`. The session is stored as one
//! JSON record under a configurable key, so each write replaces the whole
//! record in a single statement.

use chrono::Utc;
use sqlx::Row;
use tracing::warn;
use tungs_core::repository::SessionStore;
use tungs_core::session::codec;
use tungs_types::error::StoreError;
use tungs_types::session::Session;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
    key: String,
}

impl SqliteSessionStore {
    pub fn new(pool: DatabasePool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

fn storage_error(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

impl SessionStore for SqliteSessionStore {
    async fn get(&self) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT value FROM session_cache WHERE key = ?")
            .bind(&self.key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("value").map_err(storage_error)?;

        match codec::decode(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding unreadable session record");
                Ok(None)
            }
        }
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        let value = codec::encode(session)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO session_cache (key, value, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(&self.key)
        .bind(&value)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session_cache WHERE key = ?")
            .bind(&self.key)
            .execute(&self.pool.writer)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}
