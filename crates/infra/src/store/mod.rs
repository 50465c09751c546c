//! Persistent store abstractions.
//!
//! Every read of an owned resource is filtered by owner inside the store, so a
//! foreign record is indistinguishable from a missing one. Every write is a
//! single atomic unit (one lock guard in memory, one transaction in Postgres).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use tenantry_apps::{App, AppFields};
use tenantry_auth::{AppOwnership, NewAccount, UserAccount};
use tenantry_core::{AppId, PlanId, SubscriptionId, UserId};
use tenantry_subscriptions::{NewPlan, Plan, Subscription, SubscriptionFields};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Unique constraints known to the stores.
///
/// Backends report violations by these names so callers can tell which rule
/// was hit without parsing backend messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UniqueConstraint {
    Username,
    Email,
    AppName,
    SubscriptionUserApp,
}

impl UniqueConstraint {
    pub fn describe(&self) -> &'static str {
        match self {
            UniqueConstraint::Username => "a user with that username already exists",
            UniqueConstraint::Email => "a user with that email already exists",
            UniqueConstraint::AppName => "app with this name already exists",
            UniqueConstraint::SubscriptionUserApp => "a subscription for this user and app already exists",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {}", .0.describe())]
    UniqueViolation(UniqueConstraint),

    /// A subscription write named an app that is missing or owned by someone
    /// else at write time.
    #[error("app is not owned by the subscriber")]
    AppNotOwned,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result of deleting an app together with its subscription cascade.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AppDeletion {
    /// Whether an app owned by the caller was removed.
    pub removed: bool,
    /// Subscriptions switched to `active = false` by the cascade.
    pub deactivated: usize,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, account: NewAccount) -> Result<UserAccount, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    /// All plans in insertion order.
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError>;
    async fn get_plan(&self, id: PlanId) -> Result<Option<Plan>, StoreError>;
    /// Administrative seeding only; not reachable from the HTTP surface.
    async fn insert_plan(&self, plan: NewPlan) -> Result<Plan, StoreError>;
}

#[async_trait]
pub trait AppStore: Send + Sync {
    async fn list_apps(&self, owner: UserId) -> Result<Vec<App>, StoreError>;
    async fn get_app(&self, owner: UserId, id: AppId) -> Result<Option<App>, StoreError>;
    async fn insert_app(&self, owner: UserId, fields: AppFields) -> Result<App, StoreError>;
    /// Replace the fields of an app owned by `owner`; `None` when nothing matched.
    async fn update_app(&self, owner: UserId, id: AppId, fields: AppFields) -> Result<Option<App>, StoreError>;
    /// Atomically deactivate every subscription referencing the app (any
    /// subscriber) and remove the app. Scoped to `owner`: when the app is not
    /// owned by `owner`, nothing changes.
    async fn delete_app_cascade(&self, owner: UserId, id: AppId) -> Result<AppDeletion, StoreError>;
}

/// Subscription writes re-check that `fields.app` is owned by `owner` inside
/// the same atomic unit as the write and fail with [`StoreError::AppNotOwned`]
/// otherwise, so no active subscription can outlive a concurrent app delete.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_subscriptions(&self, owner: UserId) -> Result<Vec<Subscription>, StoreError>;
    async fn get_subscription(&self, owner: UserId, id: SubscriptionId) -> Result<Option<Subscription>, StoreError>;
    async fn insert_subscription(&self, owner: UserId, fields: SubscriptionFields) -> Result<Subscription, StoreError>;
    async fn update_subscription(
        &self,
        owner: UserId,
        id: SubscriptionId,
        fields: SubscriptionFields,
    ) -> Result<Option<Subscription>, StoreError>;
}

/// Everything the services need from a backend.
pub trait Store: UserStore + PlanStore + AppStore + SubscriptionStore + AppOwnership {}

impl<T> Store for T where T: UserStore + PlanStore + AppStore + SubscriptionStore + AppOwnership {}

pub type SharedStore = Arc<dyn Store>;
