use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{Resource, ValidationErrors};
use super::store::{Store, StoreError};
use crate::types::{EntityId, Operation};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{resource} not found")]
    NotFound { resource: &'static str, id: EntityId },

    #[error("{0}")]
    Conflict(String),

    #[error("{operation} on {collection} failed: {source}")]
    Store {
        collection: &'static str,
        operation: Operation,
        #[source]
        source: StoreError,
    },
}

impl RepositoryError {
    fn from_store<R: Resource>(operation: Operation, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => RepositoryError::NotFound {
                resource: R::NAME,
                id,
            },
            StoreError::Conflict { id, .. } => {
                RepositoryError::Conflict(format!("{} {} already exists", R::NAME, id))
            }
            source => RepositoryError::Store {
                collection: R::COLLECTION,
                operation,
                source,
            },
        }
    }
}

/// Domain rules in front of a persistence adapter: validation, id
/// assignment and uniqueness.
///
/// Ids are one past the highest id the store has ever held (as reported by
/// `Store::last_issued_id`, which persistent stores keep across restarts), so an
/// id freed by a delete is never handed to a different entity.
/// Creates and updates run inside the `writer` section; reads do not.
pub struct Repository<R: Resource> {
    store: Arc<dyn Store<R>>,
    /// Highest id issued so far; the lock is the single-writer section
    writer: Mutex<EntityId>,
}

impl<R: Resource> Repository<R> {
    pub fn new(store: Arc<dyn Store<R>>) -> Self {
        Self {
            store,
            writer: Mutex::new(0),
        }
    }

    pub async fn list(&self) -> Result<Vec<R>, RepositoryError> {
        self.store
            .find_all()
            .await
            .map_err(|e| RepositoryError::from_store::<R>(Operation::List, e))
    }

    pub async fn create(&self, input: R::Input) -> Result<R, RepositoryError> {
        R::validate_create(&input).map_err(RepositoryError::Validation)?;

        let mut last_issued = self.writer.lock().await;

        let existing = self
            .store
            .find_all()
            .await
            .map_err(|e| RepositoryError::from_store::<R>(Operation::Create, e))?;

        let recorded = self
            .store
            .last_issued_id()
            .await
            .map_err(|e| RepositoryError::from_store::<R>(Operation::Create, e))?;

        let highest = existing
            .iter()
            .map(R::id)
            .max()
            .unwrap_or(0)
            .max(recorded)
            .max(*last_issued);
        let id = highest.checked_add(1).ok_or_else(|| RepositoryError::Store {
            collection: R::COLLECTION,
            operation: Operation::Create,
            source: StoreError::Unexpected("id space exhausted".to_string()),
        })?;

        let entity = R::build(id, input, Utc::now());

        if let Some(key) = entity.unique_key() {
            if existing.iter().any(|e| e.unique_key().as_deref() == Some(key.as_str())) {
                return Err(RepositoryError::Conflict(format!(
                    "{} '{}' already exists",
                    R::NAME,
                    key
                )));
            }
        }

        let stored = self
            .store
            .insert(entity)
            .await
            .map_err(|e| RepositoryError::from_store::<R>(Operation::Create, e))?;
        *last_issued = id;

        info!("Created {} {}", R::NAME, id);
        Ok(stored)
    }

    pub async fn get_by_id(&self, id: EntityId) -> Result<R, RepositoryError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(|e| RepositoryError::from_store::<R>(Operation::Select, e))
    }

    pub async fn update(&self, id: EntityId, input: R::Input) -> Result<R, RepositoryError> {
        R::validate_update(&input).map_err(RepositoryError::Validation)?;

        let _writer = self.writer.lock().await;

        let current = self
            .store
            .find_by_id(id)
            .await
            .map_err(|e| RepositoryError::from_store::<R>(Operation::Update, e))?;

        let mut candidate = current.clone();
        candidate.merge(input.clone());

        if let Some(key) = candidate.unique_key() {
            if current.unique_key().as_deref() != Some(key.as_str()) {
                let taken = self
                    .store
                    .find_all()
                    .await
                    .map_err(|e| RepositoryError::from_store::<R>(Operation::Update, e))?
                    .iter()
                    .any(|e| e.id() != id && e.unique_key().as_deref() == Some(key.as_str()));
                if taken {
                    return Err(RepositoryError::Conflict(format!(
                        "{} '{}' already exists",
                        R::NAME,
                        key
                    )));
                }
            }
        }

        let updated = self
            .store
            .update(id, input)
            .await
            .map_err(|e| RepositoryError::from_store::<R>(Operation::Update, e))?;

        debug!("Updated {} {}", R::NAME, id);
        Ok(updated)
    }

    pub async fn delete(&self, id: EntityId) -> Result<(), RepositoryError> {
        self.store
            .remove(id)
            .await
            .map_err(|e| RepositoryError::from_store::<R>(Operation::Delete, e))?;

        info!("Deleted {} {}", R::NAME, id);
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::models::{Book, BookInput, UserInput, UserRecord};

    fn books() -> Repository<Book> {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    fn titled(title: &str) -> BookInput {
        BookInput {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_id_is_one() {
        let repo = books();
        let book = repo.create(titled("Dune")).await.unwrap();
        assert_eq!(book.id, 1);
        assert_eq!(book.title, "Dune");
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = books();
        let created = repo
            .create(BookInput {
                title: Some("Emma".into()),
                author: Some("Jane Austen".into()),
                year: Some(1815),
                price: None,
            })
            .await
            .unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.author.as_deref(), Some("Jane Austen"));
        assert_eq!(fetched.year, Some(1815));
    }

    #[tokio::test]
    async fn invalid_create_leaves_store_untouched() {
        let repo = books();
        let err = repo.create(BookInput::default()).await.unwrap_err();
        match err {
            RepositoryError::Validation(errors) => assert_eq!(errors.summary(), "Title is required"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_ids_are_never_reissued() {
        let repo = books();
        repo.create(titled("a")).await.unwrap();
        let second = repo.create(titled("b")).await.unwrap();
        repo.delete(second.id).await.unwrap();

        let third = repo.create(titled("c")).await.unwrap();
        assert_eq!(third.id, 3);
    }

    #[tokio::test]
    async fn deleted_max_id_is_not_reissued_after_reopen() {
        use crate::database::file::FileStore;

        let dir = std::env::temp_dir().join(format!("crud-repo-{}", uuid::Uuid::new_v4().simple()));
        {
            let repo = Repository::<Book>::new(Arc::new(FileStore::open(&dir).await.unwrap()));
            repo.create(titled("a")).await.unwrap();
            let second = repo.create(titled("b")).await.unwrap();
            repo.delete(second.id).await.unwrap();
        }

        let reopened = Repository::<Book>::new(Arc::new(FileStore::open(&dir).await.unwrap()));
        assert_eq!(reopened.create(titled("c")).await.unwrap().id, 3);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn ids_continue_after_preloaded_rows() {
        let seeded = Book::build(41, titled("seed"), Utc::now());
        let repo = Repository::<Book>::new(Arc::new(MemoryStore::with_rows(vec![seeded])));
        assert_eq!(repo.create(titled("next")).await.unwrap().id, 42);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let repo = books();
        let book = repo.create(titled("Dune")).await.unwrap();
        repo.delete(book.id).await.unwrap();

        assert!(matches!(
            repo.get_by_id(book.id).await,
            Err(RepositoryError::NotFound { resource: "Book", .. })
        ));
        assert!(matches!(
            repo.delete(book.id).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn update_merges_without_touching_identity() {
        let repo = books();
        let book = repo.create(titled("Dune")).await.unwrap();

        let updated = repo
            .update(
                book.id,
                BookInput {
                    author: Some("Frank Herbert".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, book.id);
        assert_eq!(updated.created_at, book.created_at);
        assert_eq!(updated.title, "Dune");
        assert_eq!(updated.author.as_deref(), Some("Frank Herbert"));
    }

    #[tokio::test]
    async fn update_of_missing_id_is_not_found() {
        let repo = books();
        assert!(matches!(
            repo.update(5, titled("x")).await,
            Err(RepositoryError::NotFound { id: 5, .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_ids() {
        let repo = Arc::new(books());
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.create(titled(&format!("book {i}"))).await })
            })
            .collect();

        let mut ids: Vec<EntityId> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap().id)
            .collect();
        ids.sort_unstable();

        assert_eq!(ids, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let repo = Repository::<UserRecord>::new(Arc::new(MemoryStore::new()));
        let ada = |email: &str| UserInput {
            name: Some("Ada".into()),
            email: Some(email.into()),
            age: None,
        };

        let first = repo.create(ada("ada@example.com")).await.unwrap();
        let grace = repo.create(ada("grace@example.com")).await.unwrap();

        assert!(matches!(
            repo.create(ada("ADA@example.com")).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            repo.update(
                grace.id,
                UserInput {
                    email: Some("ada@example.com".into()),
                    ..Default::default()
                }
            )
            .await,
            Err(RepositoryError::Conflict(_))
        ));

        // re-saving your own email is fine
        repo.update(first.id, ada("ada@example.com")).await.unwrap();
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}
