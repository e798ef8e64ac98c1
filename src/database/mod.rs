pub mod file;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod retry;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use repository::{Repository, RepositoryError};
pub use store::{Store, StoreError};
