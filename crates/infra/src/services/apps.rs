//! App registry: owner-scoped CRUD for apps.

use tenantry_apps::{App, AppFields, AppPatch};
use tenantry_core::{AppId, UserId};

use super::{RegistryError, RegistryResult, SharedGuard};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct AppRegistry {
    store: SharedStore,
    guard: SharedGuard,
}

impl AppRegistry {
    pub fn new(store: SharedStore, guard: SharedGuard) -> Self {
        Self { store, guard }
    }

    pub async fn list(&self, user: UserId) -> RegistryResult<Vec<App>> {
        Ok(self.store.list_apps(user).await?)
    }

    /// `NotFound` both for missing apps and for apps owned by someone else.
    pub async fn get(&self, user: UserId, id: AppId) -> RegistryResult<App> {
        self.store.get_app(user, id).await?.ok_or(RegistryError::NotFound)
    }

    pub async fn create(&self, user: UserId, claimed_owner: Option<UserId>, fields: AppFields) -> RegistryResult<App> {
        self.guard.ensure_claimed_owner(user, claimed_owner)?;
        let fields = fields.validated()?;

        let app = self.store.insert_app(user, fields).await?;
        tracing::info!(%user, app_id = %app.id, name = %app.name(), "app created");
        Ok(app)
    }

    pub async fn update(
        &self,
        user: UserId,
        id: AppId,
        claimed_owner: Option<UserId>,
        fields: AppFields,
    ) -> RegistryResult<App> {
        self.guard.ensure_claimed_owner(user, claimed_owner)?;
        let fields = fields.validated()?;

        let app = self
            .store
            .update_app(user, id, fields)
            .await?
            .ok_or(RegistryError::NotFound)?;
        tracing::info!(%user, app_id = %id, "app updated");
        Ok(app)
    }

    pub async fn partial_update(
        &self,
        user: UserId,
        id: AppId,
        claimed_owner: Option<UserId>,
        patch: AppPatch,
    ) -> RegistryResult<App> {
        self.guard.ensure_claimed_owner_if_present(user, claimed_owner)?;

        let current = self.get(user, id).await?;
        if patch.is_empty() {
            return Ok(current);
        }
        let fields = patch.merge_into(&current.fields).validated()?;

        let app = self
            .store
            .update_app(user, id, fields)
            .await?
            .ok_or(RegistryError::NotFound)?;
        tracing::info!(%user, app_id = %id, "app partially updated");
        Ok(app)
    }

    /// Remove the app and deactivate every subscription that references it.
    ///
    /// Succeeds without effect when `user` does not own the app.
    pub async fn delete(&self, user: UserId, id: AppId) -> RegistryResult<()> {
        let deletion = self.store.delete_app_cascade(user, id).await?;
        if deletion.removed {
            tracing::info!(%user, app_id = %id, deactivated = deletion.deactivated, "app deleted");
        } else {
            tracing::debug!(%user, app_id = %id, "app delete matched nothing");
        }
        Ok(())
    }
}
