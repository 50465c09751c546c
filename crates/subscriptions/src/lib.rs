//! Plans and subscriptions domain module.
//!
//! Plans are read-only catalog entries; subscriptions bind a user's app to a plan.
//! Pure domain logic only (no IO, no HTTP, no storage).

pub mod plan;
pub mod subscription;

pub use plan::{NewPlan, Plan, Price};
pub use subscription::{Subscription, SubscriptionDraft, SubscriptionFields, SubscriptionPatch};
