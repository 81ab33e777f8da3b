//! # Client State Repository
//!
//! A durable key → text store. The session manager keeps the serialized
//! Identity here under one fixed key.
//!
//! ## Table
//! ```text
//! client_state
//! ┌──────────────┬──────────────────────────────┬──────────────────────────┐
//! │ key (PK)     │ value                        │ updated_at               │
//! ├──────────────┼──────────────────────────────┼──────────────────────────┤
//! │ "user"       │ {"id":1,"name":..,"token":..}│ 2024-05-01T10:00:00Z     │
//! └──────────────┴──────────────────────────────┴──────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// A stored record with its last write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository for the `client_state` table.
#[derive(Debug, Clone)]
pub struct KvRepository {
    pool: SqlitePool,
}

impl KvRepository {
    pub fn new(pool: SqlitePool) -> Self {
        KvRepository { pool }
    }

    /// Returns the value stored under `key`, if any.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.get_entry(key).await?.map(|e| e.value))
    }

    /// Returns the value and its write time.
    pub async fn get_entry(&self, key: &str) -> DbResult<Option<StoredValue>> {
        let row: Option<(String, DateTime<Utc>)> =
            sqlx::query_as("SELECT value, updated_at FROM client_state WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value, updated_at)| StoredValue { value, updated_at }))
    }

    /// Inserts or replaces the value under `key`.
    pub async fn put(&self, key: &str, value: &str) -> DbResult<()> {
        debug!(key = %key, bytes = value.len(), "Writing client state");

        sqlx::query(
            r#"
            INSERT INTO client_state (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes `key`. Returns whether a record existed.
    pub async fn remove(&self, key: &str) -> DbResult<bool> {
        debug!(key = %key, "Removing client state");

        let result = sqlx::query("DELETE FROM client_state WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> DbResult<Vec<String>> {
        let keys = sqlx::query_scalar("SELECT key FROM client_state ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
