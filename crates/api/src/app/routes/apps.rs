use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use tenantry_core::AppId;
use tenantry_infra::services::{AppServices, RegistryError};

use crate::app::dto::{self, JsonBody};
use crate::app::errors;
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_apps).post(create_app))
        .route(
            "/:id",
            get(retrieve_app)
                .put(update_app)
                .patch(partial_update_app)
                .delete(delete_app),
        )
}

pub async fn list_apps(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.apps.list(user.user_id()).await {
        Ok(apps) => {
            let body: Vec<_> = apps.into_iter().map(dto::app_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::registry_error_to_response(e),
    }
}

/// Returns a list of zero or one apps; a foreign or unknown id is an empty list.
pub async fn retrieve_app(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AppId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("app"),
    };

    let found = match services.apps.get(user.user_id(), id).await {
        Ok(app) => vec![dto::app_to_json(app)],
        Err(RegistryError::NotFound) => Vec::new(),
        Err(e) => return errors::registry_error_to_response(e),
    };
    (StatusCode::OK, Json(found)).into_response()
}

pub async fn create_app(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    JsonBody(body): JsonBody<dto::AppRequest>,
) -> axum::response::Response {
    let (claimed_owner, fields) = body.into_parts();

    match services.apps.create(user.user_id(), claimed_owner, fields).await {
        Ok(app) => (StatusCode::CREATED, Json(dto::app_to_json(app))).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn update_app(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::AppRequest>,
) -> axum::response::Response {
    let id: AppId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("app"),
    };
    let (claimed_owner, fields) = body.into_parts();

    match services.apps.update(user.user_id(), id, claimed_owner, fields).await {
        Ok(app) => (StatusCode::OK, Json(dto::app_to_json(app))).into_response(),
        Err(e) => errors::mutation_error_to_response(e),
    }
}

pub async fn partial_update_app(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::AppPatchRequest>,
) -> axum::response::Response {
    let id: AppId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("app"),
    };
    let (claimed_owner, patch) = body.into_parts();

    match services.apps.partial_update(user.user_id(), id, claimed_owner, patch).await {
        Ok(app) => (StatusCode::OK, Json(dto::app_to_json(app))).into_response(),
        Err(e) => errors::mutation_error_to_response(e),
    }
}

/// 204 even when nothing was deleted.
pub async fn delete_app(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AppId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("app"),
    };

    match services.apps.delete(user.user_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::mutation_error_to_response(e),
    }
}
