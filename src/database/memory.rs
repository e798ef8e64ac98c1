use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::models::Resource;
use super::store::{Store, StoreError};
use crate::types::EntityId;

/// In-process store backed by an insertion-ordered vector
pub struct MemoryStore<R> {
    rows: RwLock<Vec<R>>,
    last_id: AtomicU64,
}

impl<R: Resource> MemoryStore<R> {
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    pub fn with_rows(rows: Vec<R>) -> Self {
        let last_id = rows.iter().map(R::id).max().unwrap_or(0);
        Self {
            rows: RwLock::new(rows),
            last_id: AtomicU64::new(last_id),
        }
    }
}

impl<R: Resource> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Resource> Store<R> for MemoryStore<R> {
    async fn find_all(&self) -> Result<Vec<R>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn find_by_id(&self, id: EntityId) -> Result<R, StoreError> {
        self.rows
            .read()
            .await
            .iter()
            .find(|row| row.id() == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found::<R>(id))
    }

    async fn insert(&self, entity: R) -> Result<R, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|row| row.id() == entity.id()) {
            return Err(StoreError::Conflict {
                collection: R::COLLECTION,
                id: entity.id(),
            });
        }
        rows.push(entity.clone());
        self.last_id.fetch_max(entity.id(), Ordering::SeqCst);
        Ok(entity)
    }

    async fn update(&self, id: EntityId, input: R::Input) -> Result<R, StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id() == id)
            .ok_or_else(|| StoreError::not_found::<R>(id))?;
        row.merge(input);
        Ok(row.clone())
    }

    async fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let index = rows
            .iter()
            .position(|row| row.id() == id)
            .ok_or_else(|| StoreError::not_found::<R>(id))?;
        rows.remove(index);
        Ok(())
    }

    async fn last_issued_id(&self) -> Result<EntityId, StoreError> {
        Ok(self.last_id.load(Ordering::SeqCst))
    }
}
