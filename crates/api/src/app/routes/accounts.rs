use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use tenantry_auth::Signup;
use tenantry_infra::services::AppServices;

use crate::app::dto::{self, JsonBody};
use crate::app::errors;

pub fn router() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<Signup>,
) -> axum::response::Response {
    match services.accounts.signup(body).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::LoginRequest>,
) -> axum::response::Response {
    match services.accounts.login(&body.username, &body.password).await {
        Ok(session) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "token": session.token,
                // Older clients read the token from `key`.
                "key": session.token,
                "user": dto::user_to_json(&session.user),
            })),
        )
            .into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}
