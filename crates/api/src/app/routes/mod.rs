use axum::Router;

pub mod accounts;
pub mod apps;
pub mod plans;
pub mod subscriptions;
pub mod system;

/// Router for all authenticated (owner-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/plans", plans::router())
        .nest("/apps", apps::router())
        .nest("/subscriptions", subscriptions::router())
}

/// Endpoints reachable without a credential.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", axum::routing::get(system::health))
        .merge(accounts::router())
}
