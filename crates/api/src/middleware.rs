use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use tenantry_auth::{Credential, IdentityResolver};

use crate::app::errors;
use crate::context::UserContext;

#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<dyn IdentityResolver>,
}

/// Resolve the caller and attach a [`UserContext`].
///
/// A `UserContext` already present (set by an outer session layer) is passed
/// through the resolver as a session credential instead of reading headers.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let credential = match req.extensions().get::<UserContext>() {
        Some(session) => Some(Credential::Session(session.user_id())),
        None => extract_credential(req.headers()),
    };

    let user = state.identity.resolve(credential.as_ref()).map_err(|e| {
        tracing::debug!(error = %e, "request not authenticated");
        errors::json_error(StatusCode::UNAUTHORIZED, "not_authenticated", e.to_string())
    })?;

    req.extensions_mut().insert(UserContext::new(user));

    Ok(next.run(req).await)
}

/// `Authorization: Bearer <token>` or the legacy `Authorization: Token <token>`.
fn extract_credential(headers: &HeaderMap) -> Option<Credential> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;

    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") && !scheme.eq_ignore_ascii_case("token") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(Credential::Bearer(token.to_string()))
}
