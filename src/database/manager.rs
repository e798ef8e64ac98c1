use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::file::FileStore;
use super::memory::MemoryStore;
use super::models::Resource;
use super::postgres::{map_sqlx, PgStore, SCHEMA_SQL};
use super::retry::RetryingStore;
use super::store::{Store, StoreError};
use crate::config::{StoreBackend, StoreConfig};

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Opens persistence adapters for the configured backend
pub struct DatabaseManager {
    config: StoreConfig,
    pool: Option<PgPool>,
}

impl DatabaseManager {
    /// Prepare the backend; for postgres this connects the pool and creates the table
    pub async fn connect(config: &StoreConfig) -> Result<Self, DatabaseError> {
        let pool = match config.backend {
            StoreBackend::Postgres => Some(Self::connect_pool(config).await?),
            StoreBackend::Memory | StoreBackend::File => None,
        };

        info!("Using {:?} store backend", config.backend);
        Ok(Self {
            config: config.clone(),
            pool,
        })
    }

    async fn connect_pool(config: &StoreConfig) -> Result<PgPool, DatabaseError> {
        let raw = config
            .database_url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let url = Self::validate_url(raw)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url.as_str())
            .await
            .map_err(map_sqlx)?;

        for statement in SCHEMA_SQL {
            sqlx::query(statement).execute(&pool).await.map_err(map_sqlx)?;
        }

        info!(
            "Connected database pool to {}{}",
            url.host_str().unwrap_or("localhost"),
            url.path()
        );
        Ok(pool)
    }

    fn validate_url(raw: &str) -> Result<url::Url, DatabaseError> {
        let url = url::Url::parse(raw).map_err(|e| DatabaseError::InvalidDatabaseUrl(e.to_string()))?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(url),
            other => Err(DatabaseError::InvalidDatabaseUrl(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }

    pub fn backend(&self) -> StoreBackend {
        self.config.backend
    }

    /// Open the adapter for one collection, wrapped in the retry-once decorator
    pub async fn open<R: Resource>(&self) -> Result<Arc<dyn Store<R>>, DatabaseError> {
        let store: Arc<dyn Store<R>> = match (&self.config.backend, &self.pool) {
            (StoreBackend::Memory, _) => Arc::new(RetryingStore::new(MemoryStore::<R>::new())),
            (StoreBackend::File, _) => {
                let store = FileStore::<R>::open(&self.config.data_dir).await?;
                Arc::new(RetryingStore::new(store))
            }
            (StoreBackend::Postgres, Some(pool)) => {
                Arc::new(RetryingStore::new(PgStore::<R>::new(pool.clone())))
            }
            (StoreBackend::Postgres, None) => return Err(DatabaseError::ConfigMissing("DATABASE_URL")),
        };
        Ok(store)
    }

    /// Close the pool, if any (e.g., on shutdown)
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
            info!("Closed database pool");
        }
    }
}
