//! Identity resolution: inbound credential → authenticated user.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use tenantry_core::UserId;

use crate::jwt::JwtValidator;

/// A credential presented by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Raw token taken from the `Authorization` header.
    Bearer(String),
    /// A principal already authenticated by an outer session layer.
    Session(UserId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthnError {
    #[error("authentication credentials were not provided")]
    MissingCredential,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Maps a credential to the user it authenticates.
///
/// Injected into the HTTP layer so transport-level parsing stays separate from
/// how tokens are verified.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: Option<&Credential>) -> Result<UserId, AuthnError>;
}

impl<R> IdentityResolver for Arc<R>
where
    R: IdentityResolver + ?Sized,
{
    fn resolve(&self, credential: Option<&Credential>) -> Result<UserId, AuthnError> {
        (**self).resolve(credential)
    }
}

/// Resolver backed by signed JWTs.
pub struct JwtIdentityResolver {
    jwt: Arc<dyn JwtValidator>,
}

impl JwtIdentityResolver {
    pub fn new(jwt: Arc<dyn JwtValidator>) -> Self {
        Self { jwt }
    }
}

impl IdentityResolver for JwtIdentityResolver {
    fn resolve(&self, credential: Option<&Credential>) -> Result<UserId, AuthnError> {
        match credential {
            None => Err(AuthnError::MissingCredential),
            Some(Credential::Session(user)) => Ok(*user),
            Some(Credential::Bearer(token)) => {
                let token = token.trim();
                if token.is_empty() {
                    return Err(AuthnError::MissingCredential);
                }
                self.jwt
                    .validate(token, Utc::now())
                    .map(|claims| claims.sub)
                    .map_err(|e| AuthnError::InvalidToken(e.to_string()))
            }
        }
    }
}
