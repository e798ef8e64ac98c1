// POST /auth/login   (public)         exchange account credentials for a bearer token
// GET  /auth/whoami  (authenticated)  echo the caller's principal

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{password, Principal};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub principal: Principal,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;

    if request.username.trim().is_empty() {
        return Err(ApiError::invalid_field("username", "Username is required"));
    }

    let account = password::authenticate(
        &state.config.security.accounts,
        request.username.trim(),
        &request.password,
    )
    .map_err(|e| {
        tracing::warn!("Login failed for '{}'", request.username.trim());
        ApiError::from(e)
    })?;

    let issued = state.tokens.issue(account.subject(), account.role)?;
    tracing::info!("Issued token for '{}' ({})", account.username, account.role);

    Ok(ApiResponse::success(LoginResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_in: issued.expires_in,
        principal: Principal::from(issued.claims),
    }))
}

pub async fn whoami(principal: Principal) -> ApiResult<Principal> {
    Ok(ApiResponse::success(principal))
}

