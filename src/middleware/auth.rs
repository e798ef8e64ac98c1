use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{AuthError, Principal, TokenService};
use crate::error::ApiError;
use crate::types::Role;

/// Access level a route demands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    /// Authenticated and holding one of these roles
    Roles(Vec<Role>),
}

impl Access {
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Access::Roles(roles.into_iter().collect())
    }
}

/// Access levels for the five resource routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub list: Access,
    pub show: Access,
    pub create: Access,
    pub update: Access,
    pub delete: Access,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            list: Access::Public,
            show: Access::Public,
            create: Access::Authenticated,
            update: Access::Authenticated,
            delete: Access::Authenticated,
        }
    }
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingCredential)?;

    let value = header
        .to_str()
        .map_err(|_| AuthError::MalformedCredential("Invalid Authorization header format"))?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential("Authorization header must use Bearer token format"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedCredential(
            "Authorization header must use Bearer token format",
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedCredential("Empty bearer token"));
    }
    Ok(token)
}

/// Unauthenticated -> Authenticated: verify the credential and build the principal
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<Principal, AuthError> {
    let token = extract_bearer(headers)?;
    let claims = tokens.verify(token)?;
    Ok(Principal::from(claims))
}

/// Authenticated -> Authorized: check the principal's role against the route
pub fn authorize(principal: &Principal, access: &Access) -> Result<(), AuthError> {
    match access {
        Access::Roles(allowed) if !allowed.contains(&principal.role) => Err(AuthError::Forbidden {
            role: principal.role,
        }),
        _ => Ok(()),
    }
}

/// Middleware state: the verifier plus the access level of the guarded route
#[derive(Clone)]
pub struct AccessGuard {
    tokens: Arc<TokenService>,
    access: Access,
}

impl AccessGuard {
    pub fn new(tokens: Arc<TokenService>, access: Access) -> Self {
        Self { tokens, access }
    }
}

/// Two-stage auth middleware. Every failure is terminal for the request; on
/// success the `Principal` is inserted into the request extensions.
pub async fn enforce_access(
    State(guard): State<AccessGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if guard.access == Access::Public {
        return Ok(next.run(request).await);
    }

    let principal = authenticate(request.headers(), &guard.tokens).map_err(|e| {
        tracing::warn!("Authentication failed for {} {}: {}", request.method(), request.uri().path(), e);
        ApiError::from(e)
    })?;

    authorize(&principal, &guard.access).map_err(|e| {
        tracing::warn!(
            "Authorization failed for subject '{}' on {} {}: {}",
            principal.subject_id,
            request.method(),
            request.uri().path(),
            e
        );
        ApiError::from(e)
    })?;

    tracing::debug!("Authorized subject '{}' ({})", principal.subject_id, principal.role);
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
