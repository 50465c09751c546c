use tenantry_core::{PlanId, UserId};
use tenantry_subscriptions::Plan;

use super::{RegistryError, RegistryResult};
use crate::store::SharedStore;

/// Read-only view of the plan catalog.
#[derive(Clone)]
pub struct PlanCatalog {
    store: SharedStore,
}

impl PlanCatalog {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// All plans in insertion order.
    pub async fn list(&self) -> RegistryResult<Vec<Plan>> {
        Ok(self.store.list_plans().await?)
    }

    pub async fn get(&self, id: PlanId) -> RegistryResult<Plan> {
        self.store.get_plan(id).await?.ok_or(RegistryError::NotFound)
    }

    /// Any create/update/delete attempt by a regular user.
    pub fn reject_write(&self, user: UserId) -> RegistryResult<()> {
        tracing::debug!(%user, "plan write rejected");
        Err(RegistryError::MethodNotSupported)
    }
}
