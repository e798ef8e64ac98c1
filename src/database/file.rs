use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::Resource;
use super::store::{Store, StoreError};
use crate::types::EntityId;

/// File contents: the rows plus the highest id ever stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Collection<R> {
    last_id: EntityId,
    rows: Vec<R>,
}

/// Older files hold a bare array of rows
#[derive(Deserialize)]
#[serde(untagged)]
enum OnDisk<R> {
    Collection(Collection<R>),
    Rows(Vec<R>),
}

impl<R: Resource> From<OnDisk<R>> for Collection<R> {
    fn from(on_disk: OnDisk<R>) -> Self {
        match on_disk {
            OnDisk::Collection(mut collection) => {
                let highest = collection.rows.iter().map(R::id).max().unwrap_or(0);
                collection.last_id = collection.last_id.max(highest);
                collection
            }
            OnDisk::Rows(rows) => Collection {
                last_id: rows.iter().map(R::id).max().unwrap_or(0),
                rows,
            },
        }
    }
}

/// Store persisting one collection as a JSON file.
///
/// The whole collection is cached in memory; every mutation rewrites the file
/// through a temp file + rename and only then replaces the cached copy.
pub struct FileStore<R> {
    path: PathBuf,
    collection: Mutex<Collection<R>>,
}

impl<R: Resource> FileStore<R> {
    /// Open `<dir>/<collection>.json`, creating the directory when missing
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::Unavailable(format!("create {}: {}", dir.display(), e)))?;

        let path = dir.join(format!("{}.json", R::COLLECTION));
        let collection = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Collection {
                last_id: 0,
                rows: Vec::new(),
            },
            Ok(bytes) => serde_json::from_slice::<OnDisk<R>>(&bytes)
                .map(Collection::from)
                .map_err(|e| {
                    StoreError::Unexpected(format!("corrupt data file {}: {}", path.display(), e))
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collection {
                last_id: 0,
                rows: Vec::new(),
            },
            Err(e) => {
                return Err(StoreError::Unavailable(format!("read {}: {}", path.display(), e)))
            }
        };

        info!(
            "Opened file store {} ({} rows, last id {})",
            path.display(),
            collection.rows.len(),
            collection.last_id
        );
        Ok(Self {
            path,
            collection: Mutex::new(collection),
        })
    }

    async fn persist(&self, collection: &Collection<R>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(collection)
            .map_err(|e| StoreError::Unexpected(format!("serialize {}: {}", R::COLLECTION, e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::Unavailable(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("rename {}: {}", tmp.display(), e)))?;

        debug!("Persisted {} rows to {}", collection.rows.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl<R: Resource> Store<R> for FileStore<R> {
    async fn find_all(&self) -> Result<Vec<R>, StoreError> {
        Ok(self.collection.lock().await.rows.clone())
    }

    async fn find_by_id(&self, id: EntityId) -> Result<R, StoreError> {
        self.collection
            .lock()
            .await
            .rows
            .iter()
            .find(|row| row.id() == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found::<R>(id))
    }

    async fn insert(&self, entity: R) -> Result<R, StoreError> {
        let mut current = self.collection.lock().await;
        if current.rows.iter().any(|row| row.id() == entity.id()) {
            return Err(StoreError::Conflict {
                collection: R::COLLECTION,
                id: entity.id(),
            });
        }

        let mut next = current.clone();
        next.rows.push(entity.clone());
        next.last_id = next.last_id.max(entity.id());
        self.persist(&next).await?;
        *current = next;
        Ok(entity)
    }

    async fn update(&self, id: EntityId, input: R::Input) -> Result<R, StoreError> {
        let mut current = self.collection.lock().await;
        let index = current
            .rows
            .iter()
            .position(|row| row.id() == id)
            .ok_or_else(|| StoreError::not_found::<R>(id))?;

        let mut next = current.clone();
        next.rows[index].merge(input);
        let updated = next.rows[index].clone();
        self.persist(&next).await?;
        *current = next;
        Ok(updated)
    }

    async fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        let mut current = self.collection.lock().await;
        let index = current
            .rows
            .iter()
            .position(|row| row.id() == id)
            .ok_or_else(|| StoreError::not_found::<R>(id))?;

        let mut next = current.clone();
        next.rows.remove(index);
        self.persist(&next).await?;
        *current = next;
        Ok(())
    }

    async fn last_issued_id(&self) -> Result<EntityId, StoreError> {
        Ok(self.collection.lock().await.last_id)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::metadata(dir)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Unavailable(format!("stat {}: {}", dir.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Book, BookInput};
    use chrono::Utc;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("crud-file-store-{}", uuid::Uuid::new_v4().simple()))
    }

    fn book(id: EntityId, title: &str) -> Book {
        Book::build(
            id,
            BookInput {
                title: Some(title.into()),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = temp_dir();
        {
            let store = FileStore::<Book>::open(&dir).await.unwrap();
            store.insert(book(1, "Dune")).await.unwrap();
            store.insert(book(2, "Emma")).await.unwrap();
            store.remove(1).await.unwrap();
            store
                .update(
                    2,
                    BookInput {
                        author: Some("Jane Austen".into()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let reopened = FileStore::<Book>::open(&dir).await.unwrap();
        let rows = reopened.find_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
        assert_eq!(rows[0].author.as_deref(), Some("Jane Austen"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn deleted_max_id_survives_reopen() {
        let dir = temp_dir();
        {
            let store = FileStore::<Book>::open(&dir).await.unwrap();
            store.insert(book(1, "Dune")).await.unwrap();
            store.insert(book(2, "Emma")).await.unwrap();
            store.remove(2).await.unwrap();
        }

        let reopened = FileStore::<Book>::open(&dir).await.unwrap();
        assert_eq!(reopened.find_all().await.unwrap().len(), 1);
        assert_eq!(reopened.last_issued_id().await.unwrap(), 2);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn bare_row_arrays_still_open() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let rows = serde_json::to_vec(&vec![book(3, "Dune")]).unwrap();
        std::fs::write(dir.join("books.json"), rows).unwrap();

        let store = FileStore::<Book>::open(&dir).await.unwrap();
        assert_eq!(store.find_by_id(3).await.unwrap().title, "Dune");
        assert_eq!(store.last_issued_id().await.unwrap(), 3);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("books.json"), b"{not json").unwrap();

        let result = FileStore::<Book>::open(&dir).await;
        assert!(matches!(result, Err(StoreError::Unexpected(_))));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let dir = temp_dir();
        let store = FileStore::<Book>::open(&dir).await.unwrap();
        assert!(matches!(store.find_by_id(7).await, Err(StoreError::NotFound { id: 7, .. })));
        assert!(matches!(store.remove(7).await, Err(StoreError::NotFound { .. })));
        let _ = std::fs::remove_dir_all(dir);
    }
}
