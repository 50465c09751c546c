use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tenantry_infra::services::RegistryError;

/// Map a service failure to its public status code.
///
/// `Unauthenticated` and `Unauthorized` share 401. Store failures are logged
/// here and reported as a generic 400.
pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::Unauthenticated => {
            json_error(StatusCode::UNAUTHORIZED, "not_authenticated", err.to_string())
        }
        RegistryError::Unauthorized(msg) => json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg),
        RegistryError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        RegistryError::Conflict(msg) => json_error(StatusCode::BAD_REQUEST, "conflict", msg),
        RegistryError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        RegistryError::MethodNotSupported => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "method not allowed")
        }
        RegistryError::Store(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::BAD_REQUEST, "store_error", "the request could not be processed")
        }
    }
}

/// Like [`registry_error_to_response`], but a write aimed at a resource the
/// caller cannot see is a bad request rather than a 404.
pub fn mutation_error_to_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::NotFound => json_error(
            StatusCode::BAD_REQUEST,
            "not_found",
            "no such resource owned by the caller",
        ),
        other => registry_error_to_response(other),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(kind: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {kind} id"))
}
