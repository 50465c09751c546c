//! Application services: the operations exposed to the HTTP layer.
//!
//! Each service takes the resolved caller (`UserId`) explicitly and converts
//! every lower-layer failure into [`RegistryError`].

use std::sync::Arc;

use thiserror::Error;

use tenantry_auth::{
    AuthnError, AuthzError, Hs256JwtIssuer, Hs256JwtValidator, IdentityResolver, JwtIdentityResolver,
    OwnershipGuard,
};
use tenantry_core::DomainError;

use crate::config::AppConfig;
use crate::store::{SharedStore, StoreError};

pub mod accounts;
pub mod apps;
pub mod plans;
pub mod subscriptions;

pub use accounts::{Accounts, Session};
pub use apps::AppRegistry;
pub use plans::PlanCatalog;
pub use subscriptions::SubscriptionLedger;

/// Guard shared by the app registry and the subscription ledger.
pub type SharedGuard = Arc<OwnershipGuard<SharedStore>>;

/// Public failure taxonomy of every service operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("authentication credentials were not provided or are invalid")]
    Unauthenticated,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotSupported,

    /// Backend failure; details are logged, never shown to clients.
    #[error("store failure: {0}")]
    Store(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

impl From<DomainError> for RegistryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => RegistryError::Validation(msg),
            DomainError::InvalidId(msg) => RegistryError::Validation(format!("invalid identifier: {msg}")),
            DomainError::NotFound => RegistryError::NotFound,
            DomainError::Conflict(msg) => RegistryError::Conflict(msg),
            DomainError::Unauthorized => RegistryError::Unauthorized("operation not allowed".to_string()),
        }
    }
}

impl From<AuthzError> for RegistryError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Lookup(inner) => RegistryError::Store(inner.to_string()),
            other => RegistryError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AuthnError> for RegistryError {
    fn from(_: AuthnError) -> Self {
        RegistryError::Unauthenticated
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => RegistryError::Conflict(constraint.describe().to_string()),
            StoreError::AppNotOwned => {
                RegistryError::Unauthorized("operation not allowed: app is not owned by the authenticated user".to_string())
            }
            StoreError::Backend(msg) => RegistryError::Store(msg),
        }
    }
}

/// Everything the HTTP layer needs, wired over one store.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Accounts,
    pub plans: PlanCatalog,
    pub apps: AppRegistry,
    pub subscriptions: SubscriptionLedger,
    pub identity: Arc<dyn IdentityResolver>,
}

impl AppServices {
    pub fn new(store: SharedStore, config: &AppConfig) -> Self {
        let guard: SharedGuard = Arc::new(OwnershipGuard::new(store.clone()));
        let issuer = Hs256JwtIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl);
        let identity = JwtIdentityResolver::new(Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes())));

        Self {
            accounts: Accounts::new(store.clone(), issuer),
            plans: PlanCatalog::new(store.clone()),
            apps: AppRegistry::new(store.clone(), guard.clone()),
            subscriptions: SubscriptionLedger::new(store, guard),
            identity: Arc::new(identity),
        }
    }
}
