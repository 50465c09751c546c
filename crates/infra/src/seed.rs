//! Default plan catalog.

use tenantry_subscriptions::{NewPlan, Price};

use crate::store::{PlanStore, StoreError};

/// (name, description, price in cents)
const DEFAULT_PLANS: [(&str, &str, u32); 3] = [
    ("Free", "Free Plan", 0),
    ("Standard", "Standard Plan", 1_000),
    ("Pro", "Pro Plan", 2_500),
];

/// Insert the default plans when the catalog is empty. Returns how many were added.
pub async fn seed_default_plans<S>(store: &S) -> Result<usize, StoreError>
where
    S: PlanStore + ?Sized,
{
    let mut plans = Vec::with_capacity(DEFAULT_PLANS.len());
    for (name, description, cents) in DEFAULT_PLANS {
        let price = Price::from_cents(cents).map_err(|e| StoreError::Backend(e.to_string()))?;
        plans.push(NewPlan::new(name, description, price));
    }
    seed_plans(store, plans).await
}

/// Insert `plans` when the catalog is empty.
///
/// Every plan is validated before the first insert; an invalid entry seeds nothing.
pub async fn seed_plans<S>(store: &S, plans: Vec<NewPlan>) -> Result<usize, StoreError>
where
    S: PlanStore + ?Sized,
{
    if !store.list_plans().await?.is_empty() {
        tracing::debug!("plan catalog already populated; skipping seed");
        return Ok(0);
    }

    for plan in &plans {
        plan.validate()
            .map_err(|e| StoreError::Backend(format!("invalid seed plan {:?}: {e}", plan.name)))?;
    }

    let count = plans.len();
    for plan in plans {
        store.insert_plan(plan).await?;
    }

    tracing::info!(count, "seeded plans");
    Ok(count)
}
