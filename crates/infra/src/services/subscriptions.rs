//! Subscription ledger.
//!
//! Writes run their checks in a fixed order so each failure mode is distinct:
//! claimed owner, then app ownership, then plan existence, then the store's
//! (user, app) uniqueness.

use tenantry_core::{PlanId, SubscriptionId, UserId};
use tenantry_subscriptions::{Subscription, SubscriptionDraft, SubscriptionFields, SubscriptionPatch};

use super::{RegistryError, RegistryResult, SharedGuard};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct SubscriptionLedger {
    store: SharedStore,
    guard: SharedGuard,
}

impl SubscriptionLedger {
    pub fn new(store: SharedStore, guard: SharedGuard) -> Self {
        Self { store, guard }
    }

    pub async fn list(&self, user: UserId) -> RegistryResult<Vec<Subscription>> {
        Ok(self.store.list_subscriptions(user).await?)
    }

    pub async fn get(&self, user: UserId, id: SubscriptionId) -> RegistryResult<Subscription> {
        self.store
            .get_subscription(user, id)
            .await?
            .ok_or(RegistryError::NotFound)
    }

    pub async fn create(&self, user: UserId, draft: SubscriptionDraft) -> RegistryResult<Subscription> {
        let fields = self.authorize_draft(user, draft).await?;
        self.ensure_plan_exists(fields.plan).await?;

        let sub = self.store.insert_subscription(user, fields).await?;
        tracing::info!(%user, subscription_id = %sub.id, app_id = %sub.app, plan_id = %sub.plan, "subscription created");
        Ok(sub)
    }

    pub async fn update(&self, user: UserId, id: SubscriptionId, draft: SubscriptionDraft) -> RegistryResult<Subscription> {
        let fields = self.authorize_draft(user, draft).await?;
        self.ensure_plan_exists(fields.plan).await?;

        let sub = self
            .store
            .update_subscription(user, id, fields)
            .await?
            .ok_or(RegistryError::NotFound)?;
        tracing::info!(%user, subscription_id = %id, active = sub.active, "subscription updated");
        Ok(sub)
    }

    /// Only the fields present in `patch` are checked and changed.
    pub async fn partial_update(
        &self,
        user: UserId,
        id: SubscriptionId,
        patch: SubscriptionPatch,
    ) -> RegistryResult<Subscription> {
        self.guard.ensure_claimed_owner_if_present(user, patch.user)?;
        if patch.app.is_some() {
            self.guard.ensure_owns_app(user, patch.app).await?;
        }

        let current = self.get(user, id).await?;
        if let Some(plan) = patch.plan {
            self.ensure_plan_exists(plan).await?;
        }

        let fields = patch.merge_into(&current);
        if fields == current.fields() {
            return Ok(current);
        }

        let sub = self
            .store
            .update_subscription(user, id, fields)
            .await?
            .ok_or(RegistryError::NotFound)?;
        tracing::info!(%user, subscription_id = %id, active = sub.active, "subscription partially updated");
        Ok(sub)
    }

    /// Subscriptions are never deleted.
    pub fn destroy(&self, user: UserId, id: SubscriptionId) -> RegistryResult<()> {
        tracing::debug!(%user, subscription_id = %id, "subscription delete rejected");
        Err(RegistryError::MethodNotSupported)
    }

    async fn authorize_draft(&self, user: UserId, draft: SubscriptionDraft) -> RegistryResult<SubscriptionFields> {
        self.guard.ensure_claimed_owner(user, draft.user)?;
        self.guard.ensure_owns_app(user, draft.app).await?;

        let app = draft.app.ok_or_else(|| RegistryError::Unauthorized("no app referenced".to_string()))?;
        Ok(SubscriptionFields {
            plan: draft.plan,
            app,
            active: draft.active,
        })
    }

    async fn ensure_plan_exists(&self, plan: PlanId) -> RegistryResult<()> {
        match self.store.get_plan(plan).await? {
            Some(_) => Ok(()),
            None => Err(RegistryError::Validation(format!(
                "invalid pk \"{plan}\" - plan does not exist"
            ))),
        }
    }
}
