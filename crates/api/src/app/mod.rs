//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use tenantry_infra::config::AppConfig;
use tenantry_infra::services::AppServices;
use tenantry_infra::store::SharedStore;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Opens the configured store, applying the schema and plan seed.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let store = tenantry_infra::open_store(config).await?;
    Ok(build_app_with_store(store, config))
}

/// Build the router over an already opened store.
pub fn build_app_with_store(store: SharedStore, config: &AppConfig) -> Router {
    let services = Arc::new(AppServices::new(store, config));
    let auth_state = middleware::AuthState {
        identity: services.identity.clone(),
    };

    // Protected routes: require a resolved user.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let public = routes::public_router().layer(Extension(services));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
