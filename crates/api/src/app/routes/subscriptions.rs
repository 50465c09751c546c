use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use tenantry_core::SubscriptionId;
use tenantry_infra::services::{AppServices, RegistryError};

use crate::app::dto::{self, JsonBody};
use crate::app::errors;
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route(
            "/:id",
            get(retrieve_subscription)
                .put(update_subscription)
                .patch(partial_update_subscription)
                .delete(destroy_subscription),
        )
}

pub async fn list_subscriptions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.subscriptions.list(user.user_id()).await {
        Ok(subs) => {
            let body: Vec<_> = subs.into_iter().map(dto::subscription_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::registry_error_to_response(e),
    }
}

/// Returns a list of zero or one subscriptions.
pub async fn retrieve_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SubscriptionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("subscription"),
    };

    let found = match services.subscriptions.get(user.user_id(), id).await {
        Ok(sub) => vec![dto::subscription_to_json(sub)],
        Err(RegistryError::NotFound) => Vec::new(),
        Err(e) => return errors::registry_error_to_response(e),
    };
    (StatusCode::OK, Json(found)).into_response()
}

pub async fn create_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    JsonBody(body): JsonBody<dto::SubscriptionRequest>,
) -> axum::response::Response {
    match services.subscriptions.create(user.user_id(), body.into()).await {
        Ok(sub) => (StatusCode::CREATED, Json(dto::subscription_to_json(sub))).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn update_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::SubscriptionRequest>,
) -> axum::response::Response {
    let id: SubscriptionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("subscription"),
    };

    match services.subscriptions.update(user.user_id(), id, body.into()).await {
        Ok(sub) => (StatusCode::OK, Json(dto::subscription_to_json(sub))).into_response(),
        Err(e) => errors::mutation_error_to_response(e),
    }
}

pub async fn partial_update_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::SubscriptionPatchRequest>,
) -> axum::response::Response {
    let id: SubscriptionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("subscription"),
    };

    match services.subscriptions.partial_update(user.user_id(), id, body.into()).await {
        Ok(sub) => (StatusCode::OK, Json(dto::subscription_to_json(sub))).into_response(),
        Err(e) => errors::mutation_error_to_response(e),
    }
}

/// Always 405 for authenticated callers, whatever the id.
pub async fn destroy_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(id) = id.parse::<SubscriptionId>() else {
        return errors::registry_error_to_response(RegistryError::MethodNotSupported);
    };

    match services.subscriptions.destroy(user.user_id(), id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}
