use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use std::marker::PhantomData;

use super::models::Resource;
use super::store::{Store, StoreError};
use crate::types::EntityId;

/// Shared tables for every collection: JSONB entity bodies, and the highest
/// id each collection has ever stored
pub const SCHEMA_SQL: [&str; 2] = [
    r#"
CREATE TABLE IF NOT EXISTS resources (
    collection TEXT NOT NULL,
    id BIGINT NOT NULL,
    body JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, id)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS collection_counters (
    collection TEXT PRIMARY KEY,
    last_id BIGINT NOT NULL
)"#,
];

const RAISE_COUNTER_SQL: &str = r#"
INSERT INTO collection_counters (collection, last_id) VALUES ($1, $2)
ON CONFLICT (collection)
DO UPDATE SET last_id = GREATEST(collection_counters.last_id, EXCLUDED.last_id)"#;

const LAST_ID_SQL: &str = r#"
SELECT GREATEST(
    COALESCE((SELECT last_id FROM collection_counters WHERE collection = $1), 0),
    COALESCE((SELECT MAX(id) FROM resources WHERE collection = $1), 0)
) AS last_id"#;

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed store for one collection
pub struct PgStore<R> {
    pool: PgPool,
    _phantom: PhantomData<fn() -> R>,
}

impl<R: Resource> PgStore<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }
}

/// Classify sqlx failures: connection-level problems are retryable
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Unexpected(err.to_string()),
    }
}

fn db_id(id: EntityId) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Unexpected(format!("id {} exceeds BIGINT range", id)))
}

fn decode_row<R: Resource>(row: &PgRow) -> Result<R, StoreError> {
    let Json(body): Json<Value> = row.try_get("body").map_err(map_sqlx)?;
    serde_json::from_value(body)
        .map_err(|e| StoreError::Unexpected(format!("corrupt {} row: {}", R::COLLECTION, e)))
}

#[async_trait]
impl<R: Resource> Store<R> for PgStore<R> {
    async fn find_all(&self) -> Result<Vec<R>, StoreError> {
        // ids only grow, so id order is insertion order
        let mut rows = sqlx::query("SELECT body FROM resources WHERE collection = $1 ORDER BY id")
            .bind(R::COLLECTION)
            .fetch(&self.pool);

        let mut entities = Vec::new();
        while let Some(row) = rows.try_next().await.map_err(map_sqlx)? {
            entities.push(decode_row::<R>(&row)?);
        }
        Ok(entities)
    }

    async fn find_by_id(&self, id: EntityId) -> Result<R, StoreError> {
        let Ok(key) = db_id(id) else {
            return Err(StoreError::not_found::<R>(id));
        };

        let row = sqlx::query("SELECT body FROM resources WHERE collection = $1 AND id = $2")
            .bind(R::COLLECTION)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(row) => decode_row(&row),
            None => Err(StoreError::not_found::<R>(id)),
        }
    }

    async fn insert(&self, entity: R) -> Result<R, StoreError> {
        let id = entity.id();
        let key = db_id(id)?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let result = sqlx::query("INSERT INTO resources (collection, id, body) VALUES ($1, $2, $3)")
            .bind(R::COLLECTION)
            .bind(key)
            .bind(Json(&entity))
            .execute(&mut *tx)
            .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                return Err(StoreError::Conflict {
                    collection: R::COLLECTION,
                    id,
                });
            }
            Err(e) => return Err(map_sqlx(e)),
        }

        sqlx::query(RAISE_COUNTER_SQL)
            .bind(R::COLLECTION)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(entity)
    }

    async fn update(&self, id: EntityId, input: R::Input) -> Result<R, StoreError> {
        let Ok(key) = db_id(id) else {
            return Err(StoreError::not_found::<R>(id));
        };

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let row = sqlx::query(
            "SELECT body FROM resources WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(R::COLLECTION)
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let mut entity: R = match row {
            Some(row) => decode_row(&row)?,
            None => return Err(StoreError::not_found::<R>(id)),
        };
        entity.merge(input);

        sqlx::query("UPDATE resources SET body = $3 WHERE collection = $1 AND id = $2")
            .bind(R::COLLECTION)
            .bind(key)
            .bind(Json(&entity))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(entity)
    }

    async fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        let Ok(key) = db_id(id) else {
            return Err(StoreError::not_found::<R>(id));
        };

        let result = sqlx::query("DELETE FROM resources WHERE collection = $1 AND id = $2")
            .bind(R::COLLECTION)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found::<R>(id));
        }
        Ok(())
    }

    async fn last_issued_id(&self) -> Result<EntityId, StoreError> {
        let row = sqlx::query(LAST_ID_SQL)
            .bind(R::COLLECTION)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let last_id: i64 = row.try_get("last_id").map_err(map_sqlx)?;
        EntityId::try_from(last_id)
            .map_err(|_| StoreError::Unexpected(format!("negative id counter for {}", R::COLLECTION)))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_are_retryable() {
        assert!(map_sqlx(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(map_sqlx(sqlx::Error::PoolClosed).is_retryable());
        assert!(!map_sqlx(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn ids_beyond_bigint_are_rejected() {
        assert_eq!(db_id(42).unwrap(), 42);
        assert!(db_id(u64::MAX).is_err());
    }
}
