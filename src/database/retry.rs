use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, error, warn};

use super::models::Resource;
use super::store::{Store, StoreError};
use crate::types::{EntityId, Operation};

/// Wraps a store and retries an `Unavailable` failure once, immediately.
///
/// A second `Unavailable` is reported as `Unexpected`. An insert whose retry
/// hits `Conflict` is checked against the stored row, since the failed first
/// attempt may have been committed.
pub struct RetryingStore<S> {
    inner: S,
}

impl<S> RetryingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

async fn once_more<T, F, Fut>(collection: &str, operation: Operation, mut call: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    match call().await {
        Err(first) if first.is_retryable() => {
            warn!("{} {} failed, retrying once: {}", collection, operation, first);
            match call().await {
                Err(second) if second.is_retryable() => {
                    error!("{} {} failed after retry: {}", collection, operation, second);
                    Err(StoreError::Unexpected(second.to_string()))
                }
                other => other,
            }
        }
        other => other,
    }
}

#[async_trait]
impl<R, S> Store<R> for RetryingStore<S>
where
    R: Resource,
    S: Store<R>,
{
    async fn find_all(&self) -> Result<Vec<R>, StoreError> {
        once_more(R::COLLECTION, Operation::List, || Store::<R>::find_all(&self.inner)).await
    }

    async fn find_by_id(&self, id: EntityId) -> Result<R, StoreError> {
        once_more(R::COLLECTION, Operation::Select, || Store::<R>::find_by_id(&self.inner, id)).await
    }

    async fn insert(&self, entity: R) -> Result<R, StoreError> {
        let first = match Store::<R>::insert(&self.inner, entity.clone()).await {
            Err(e) if e.is_retryable() => e,
            other => return other,
        };
        warn!("{} {} failed, retrying once: {}", R::COLLECTION, Operation::Create, first);

        match Store::<R>::insert(&self.inner, entity.clone()).await {
            Err(conflict @ StoreError::Conflict { .. }) => {
                match Store::<R>::find_by_id(&self.inner, entity.id()).await {
                    Ok(stored) if stored == entity => {
                        debug!("{} {} was stored by the failed attempt", R::COLLECTION, entity.id());
                        Ok(stored)
                    }
                    _ => Err(conflict),
                }
            }
            Err(second) if second.is_retryable() => {
                error!("{} {} failed after retry: {}", R::COLLECTION, Operation::Create, second);
                Err(StoreError::Unexpected(second.to_string()))
            }
            other => other,
        }
    }

    async fn update(&self, id: EntityId, input: R::Input) -> Result<R, StoreError> {
        once_more(R::COLLECTION, Operation::Update, || {
            Store::<R>::update(&self.inner, id, input.clone())
        })
        .await
    }

    async fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        once_more(R::COLLECTION, Operation::Delete, || Store::<R>::remove(&self.inner, id)).await
    }

    async fn last_issued_id(&self) -> Result<EntityId, StoreError> {
        once_more(R::COLLECTION, Operation::Create, || Store::<R>::last_issued_id(&self.inner)).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Store::<R>::health_check(&self.inner).await
    }
}
