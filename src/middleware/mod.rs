pub mod auth;
pub mod response;

pub use auth::{enforce_access, Access, AccessGuard, AccessPolicy};
pub use response::{ApiResponse, ApiResult};
