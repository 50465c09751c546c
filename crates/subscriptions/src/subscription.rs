use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenantry_core::{AppId, Entity, PlanId, SubscriptionId, UserId};

/// A user's app bound to a plan.
///
/// # Invariants
/// - At most one subscription per (owner, app).
/// - `app` was owned by `owner` when the subscription was last written.
/// - Subscriptions are never removed; they are deactivated instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner: UserId,
    pub plan: PlanId,
    pub app: AppId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn fields(&self) -> SubscriptionFields {
        SubscriptionFields {
            plan: self.plan,
            app: self.app,
            active: self.active,
        }
    }
}

impl Entity for Subscription {
    type Id = SubscriptionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn owner(&self) -> Option<UserId> {
        Some(self.owner)
    }
}

/// The stored, owner-editable part of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionFields {
    pub plan: PlanId,
    pub app: AppId,
    pub active: bool,
}

/// Full subscription payload (create and full update).
///
/// `user` and `app` are optional here because their absence is an ownership
/// failure rather than a shape error: a subscription that names no owner or no
/// app cannot be proven to belong to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionDraft {
    pub user: Option<UserId>,
    pub plan: PlanId,
    pub app: Option<AppId>,
    pub active: bool,
}

/// Partial subscription update. Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionPatch {
    pub user: Option<UserId>,
    pub plan: Option<PlanId>,
    pub app: Option<AppId>,
    pub active: Option<bool>,
}

impl SubscriptionPatch {
    pub fn merge_into(self, current: &Subscription) -> SubscriptionFields {
        SubscriptionFields {
            plan: self.plan.unwrap_or(current.plan),
            app: self.app.unwrap_or(current.app),
            active: self.active.unwrap_or(current.active),
        }
    }
}
