use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use tenantry_core::PlanId;
use tenantry_infra::services::AppServices;

use crate::app::{dto, errors};
use crate::context::UserContext;

/// Read-only: every write method answers 405.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list_plans).post(reject_write))
        .route(
            "/:id",
            get(get_plan)
                .put(reject_write)
                .patch(reject_write)
                .delete(reject_write),
        )
}

pub async fn list_plans(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.plans.list().await {
        Ok(plans) => {
            let body: Vec<_> = plans.into_iter().map(dto::plan_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn get_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PlanId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("plan"),
    };

    match services.plans.get(id).await {
        Ok(plan) => (StatusCode::OK, Json(dto::plan_to_json(plan))).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn reject_write(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.plans.reject_write(user.user_id()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}
