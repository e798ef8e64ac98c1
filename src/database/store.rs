use async_trait::async_trait;
use thiserror::Error;

use super::models::Resource;
use crate::types::EntityId;

/// Errors raised by persistence adapters
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} {id} not found")]
    NotFound { collection: &'static str, id: EntityId },

    #[error("{collection} {id} already exists")]
    Conflict { collection: &'static str, id: EntityId },

    /// Transient medium failure (disk, connection). The only retryable kind.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Unexpected(String),
}

impl StoreError {
    pub fn not_found<R: Resource>(id: EntityId) -> Self {
        StoreError::NotFound {
            collection: R::COLLECTION,
            id,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Persistence adapter for one collection.
///
/// Implementations own the raw storage handle; only a `Repository` calls them.
#[async_trait]
pub trait Store<R: Resource>: Send + Sync {
    /// All entities in insertion order
    async fn find_all(&self) -> Result<Vec<R>, StoreError>;

    async fn find_by_id(&self, id: EntityId) -> Result<R, StoreError>;

    /// Store a new entity and return it as persisted
    async fn insert(&self, entity: R) -> Result<R, StoreError>;

    /// Merge the present fields of `input` into the stored entity
    async fn update(&self, id: EntityId, input: R::Input) -> Result<R, StoreError>;

    async fn remove(&self, id: EntityId) -> Result<(), StoreError>;

    /// Highest id this collection has ever held, deleted rows included
    async fn last_issued_id(&self) -> Result<EntityId, StoreError> {
        Ok(self.find_all().await?.iter().map(R::id).max().unwrap_or(0))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
