use axum::extract::State;
use axum::http::{Method, Uri};
use serde_json::{json, Value};

use crate::app::COLLECTIONS;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET / - service description
pub async fn root(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "store": state.database.backend(),
        "endpoints": {
            "auth": ["POST /auth/login (public)", "GET /auth/whoami (authenticated)"],
            "resources": COLLECTIONS
                .iter()
                .map(|c| format!("/{}[/:id]", c))
                .collect::<Vec<_>>(),
            "health": "/health (public)",
        }
    })))
}

/// GET /health - store reachability; 503 when any collection's store is down
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    match state.health_check().await {
        Ok(()) => Ok(ApiResponse::success(json!({
            "status": "ok",
            "store": state.database.backend(),
            "timestamp": chrono::Utc::now(),
        }))),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            Err(ApiError::service_unavailable("Store unavailable"))
        }
    }
}

/// Unknown routes answer with the error envelope
pub async fn fallback(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {} {} not found", method, uri.path()))
}
