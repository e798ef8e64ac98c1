use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::TokenService;
use crate::config::SecurityConfig;
use crate::database::models::{Book, Resource, Task, UserRecord};
use crate::database::Repository;
use crate::error::handle_panic;
use crate::handlers::{auth, resource, system};
use crate::middleware::{enforce_access, Access, AccessGuard};
use crate::state::AppState;

/// Build the full HTTP application for a ready state
pub fn app(state: AppState) -> Router {
    let tokens = state.tokens.clone();
    let api = state.config.api.clone();
    let cors = cors_layer(&state.config.security);

    let router = Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
        .route(
            "/auth/whoami",
            guarded(get(auth::whoami), &tokens, Access::Authenticated),
        )
        .with_state(state.clone())
        .merge(resource_routes(state.books.clone(), &tokens))
        .merge(resource_routes(state.tasks.clone(), &tokens))
        .merge(resource_routes(state.users.clone(), &tokens))
        .fallback(system::fallback)
        .layer(DefaultBodyLimit::max(api.max_request_size_bytes))
        .layer(CatchPanicLayer::custom(handle_panic));

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    if api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// The five routes of one resource, each behind its own access level
pub fn resource_routes<R: Resource>(repo: Arc<Repository<R>>, tokens: &Arc<TokenService>) -> Router {
    let policy = R::access_policy();
    let collection = format!("/{}", R::COLLECTION);
    let item = format!("/{}/:id", R::COLLECTION);

    Router::new()
        .route(
            &collection,
            guarded(get(resource::list::<R>), tokens, policy.list)
                .merge(guarded(post(resource::create::<R>), tokens, policy.create)),
        )
        .route(
            &item,
            guarded(get(resource::show::<R>), tokens, policy.show)
                .merge(guarded(put(resource::update::<R>), tokens, policy.update.clone()))
                .merge(guarded(patch(resource::update::<R>), tokens, policy.update))
                .merge(guarded(delete(resource::delete::<R>), tokens, policy.delete)),
        )
        .with_state(repo)
}

fn guarded<S>(route: MethodRouter<S>, tokens: &Arc<TokenService>, access: Access) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(from_fn_with_state(
        AccessGuard::new(tokens.clone(), access),
        enforce_access,
    ))
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }

    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}

/// Collections served under `/{collection}`
pub const COLLECTIONS: [&str; 3] = [Book::COLLECTION, Task::COLLECTION, UserRecord::COLLECTION];
