// Generic handlers for the five resource routes:
//   GET    /{collection}       list
//   POST   /{collection}       create
//   GET    /{collection}/:id   show
//   PUT    /{collection}/:id   update (PATCH is an alias)
//   DELETE /{collection}/:id   delete
//
// Handlers only translate: path/body -> typed input, repository result ->
// response. Domain rules live in the repository.

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;
use serde_json::Value;
use std::sync::Arc;

use crate::database::models::{Resource, SYSTEM_FIELDS};
use crate::database::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::EntityId;

/// Numeric path id, rejected with a validation error instead of a crash
pub fn parse_id(raw: &str) -> Result<EntityId, ApiError> {
    raw.trim()
        .parse::<EntityId>()
        .map_err(|_| ApiError::invalid_field("id", format!("Invalid id: {}", raw)))
}

/// Turn a JSON body into a resource's typed input.
///
/// The body must be an object and may not set repository-owned fields.
pub fn parse_input<R: Resource>(payload: Result<Json<Value>, JsonRejection>) -> Result<R::Input, ApiError> {
    let Json(body) = payload?;

    let object = body
        .as_object()
        .ok_or_else(|| ApiError::validation_error("Request body must be a JSON object", None))?;

    if let Some(field) = SYSTEM_FIELDS.iter().find(|f| object.contains_key(**f)) {
        return Err(ApiError::invalid_field(
            *field,
            format!("Field '{}' cannot be set by the client", field),
        ));
    }

    serde_json::from_value::<R::Input>(body)
        .map_err(|e| ApiError::validation_error(format!("Invalid request body: {}", e), None))
}

pub async fn list<R: Resource>(State(repo): State<Arc<Repository<R>>>) -> ApiResult<Vec<R>> {
    let rows = repo.list().await?;
    Ok(ApiResponse::success(rows))
}

pub async fn show<R: Resource>(
    State(repo): State<Arc<Repository<R>>>,
    Path(id): Path<String>,
) -> ApiResult<R> {
    let id = parse_id(&id)?;
    let entity = repo.get_by_id(id).await?;
    Ok(ApiResponse::success(entity))
}

pub async fn create<R: Resource>(
    State(repo): State<Arc<Repository<R>>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<R> {
    let input = parse_input::<R>(payload)?;
    let entity = repo.create(input).await?;
    Ok(ApiResponse::created(entity))
}

pub async fn update<R: Resource>(
    State(repo): State<Arc<Repository<R>>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<R> {
    let id = parse_id(&id)?;
    let input = parse_input::<R>(payload)?;
    let entity = repo.update(id, input).await?;
    Ok(ApiResponse::success(entity))
}

pub async fn delete<R: Resource>(
    State(repo): State<Arc<Repository<R>>>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id)?;
    repo.delete(id).await?;
    Ok(ApiResponse::no_content())
}
