use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::database::models::{Book, Task, UserRecord};
use crate::database::{DatabaseManager, Repository, StoreError};

/// Everything the router needs, shared across request tasks
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub database: Arc<DatabaseManager>,
    pub books: Arc<Repository<Book>>,
    pub tasks: Arc<Repository<Task>>,
    pub users: Arc<Repository<UserRecord>>,
}

impl AppState {
    /// Connect the configured backend and open one repository per collection
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let tokens = TokenService::new(&config.security)?;
        let database = DatabaseManager::connect(&config.store).await?;

        let books = Repository::new(database.open::<Book>().await?);
        let tasks = Repository::new(database.open::<Task>().await?);
        let users = Repository::new(database.open::<UserRecord>().await?);

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            database: Arc::new(database),
            books: Arc::new(books),
            tasks: Arc::new(tasks),
            users: Arc::new(users),
        })
    }

    /// Probe every collection's store; the first failure wins
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.books.health_check().await?;
        self.tasks.health_check().await?;
        self.users.health_check().await
    }
}
