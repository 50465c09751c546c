//! Ownership authorization.
//!
//! Every owned resource (apps, subscriptions) goes through the same
//! [`OwnershipGuard`]: payloads may only name the caller as owner, and a
//! subscription may only reference an app the caller owns.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use tenantry_core::{AppId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("operation not allowed: payload owner does not match the authenticated user")]
    OwnerMismatch,

    #[error("operation not allowed: app is not owned by the authenticated user")]
    AppNotOwned,

    #[error("ownership lookup failed: {0}")]
    Lookup(#[from] LookupError),
}

/// Failure of the underlying ownership lookup (storage unavailable, etc).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LookupError(pub String);

/// Source of truth for app ownership.
///
/// Implemented by every store backend. Must reflect committed state at call
/// time; callers never cache the answer across requests.
#[async_trait]
pub trait AppOwnership: Send + Sync {
    /// Owner of `app`, or `None` when no such app exists.
    async fn app_owner(&self, app: AppId) -> Result<Option<UserId>, LookupError>;
}

#[async_trait]
impl<L> AppOwnership for Arc<L>
where
    L: AppOwnership + ?Sized,
{
    async fn app_owner(&self, app: AppId) -> Result<Option<UserId>, LookupError> {
        (**self).app_owner(app).await
    }
}

/// Policy object shared by the app registry and the subscription ledger.
pub struct OwnershipGuard<L> {
    lookup: L,
}

impl<L> OwnershipGuard<L>
where
    L: AppOwnership,
{
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// The payload must name the caller as owner. A missing owner is a mismatch.
    pub fn ensure_claimed_owner(&self, user: UserId, claimed: Option<UserId>) -> Result<(), AuthzError> {
        if claimed == Some(user) {
            Ok(())
        } else {
            tracing::debug!(%user, ?claimed, "claimed owner mismatch");
            Err(AuthzError::OwnerMismatch)
        }
    }

    /// Partial payloads are only checked when they carry an owner at all.
    pub fn ensure_claimed_owner_if_present(
        &self,
        user: UserId,
        claimed: Option<UserId>,
    ) -> Result<(), AuthzError> {
        match claimed {
            None => Ok(()),
            Some(_) => self.ensure_claimed_owner(user, claimed),
        }
    }

    /// True iff `app` exists and is owned by `user`.
    pub async fn owns_app(&self, user: UserId, app: AppId) -> Result<bool, AuthzError> {
        let owner = self.lookup.app_owner(app).await?;
        Ok(owner == Some(user))
    }

    /// The referenced app must be present and owned by `user`.
    pub async fn ensure_owns_app(&self, user: UserId, app: Option<AppId>) -> Result<(), AuthzError> {
        let Some(app) = app else {
            tracing::debug!(%user, "no app referenced");
            return Err(AuthzError::AppNotOwned);
        };

        if self.owns_app(user, app).await? {
            Ok(())
        } else {
            tracing::debug!(%user, %app, "app not owned by caller");
            Err(AuthzError::AppNotOwned)
        }
    }
}
