use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use tenantry_apps::{App, AppFields};
use tenantry_auth::{AppOwnership, LookupError, NewAccount, UserAccount};
use tenantry_core::{AppId, PlanId, SubscriptionId, UserId};
use tenantry_subscriptions::{NewPlan, Plan, Subscription, SubscriptionFields};

use super::{
    AppDeletion, AppStore, PlanStore, StoreError, SubscriptionStore, UniqueConstraint, UserStore,
};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserAccount>,
    plans: BTreeMap<PlanId, Plan>,
    apps: BTreeMap<AppId, App>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    last_id: Sequences,
}

#[derive(Debug, Default)]
struct Sequences {
    user: i64,
    plan: i64,
    app: i64,
    subscription: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

/// In-memory store for tests/dev.
///
/// All tables sit behind one lock, so each write (including the app delete
/// cascade) is applied entirely or not at all. Ids come from per-table
/// sequences and maps are ordered by id, which gives insertion order on list.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

impl Tables {
    fn app_name_taken(&self, name: &str, except: Option<AppId>) -> bool {
        self.apps
            .values()
            .any(|a| a.fields.name == name && Some(a.id) != except)
    }

    fn owns_app(&self, owner: UserId, app: AppId) -> bool {
        self.apps.get(&app).is_some_and(|a| a.owner == owner)
    }

    fn subscription_exists(&self, owner: UserId, app: AppId, except: Option<SubscriptionId>) -> bool {
        self.subscriptions
            .values()
            .any(|s| s.owner == owner && s.app == app && Some(s.id) != except)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, account: NewAccount) -> Result<UserAccount, StoreError> {
        let mut t = self.write()?;

        if t.users.values().any(|u| u.username == account.username) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::Username));
        }
        if t.users.values().any(|u| u.email.eq_ignore_ascii_case(&account.email)) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::Email));
        }

        let id = UserId::new(next(&mut t.last_id.user));
        let user = UserAccount {
            id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            date_joined: Utc::now(),
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        let t = self.read()?;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }
}

#[async_trait]
impl PlanStore for InMemoryStore {
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        Ok(self.read()?.plans.values().cloned().collect())
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<Plan>, StoreError> {
        Ok(self.read()?.plans.get(&id).cloned())
    }

    async fn insert_plan(&self, plan: NewPlan) -> Result<Plan, StoreError> {
        let mut t = self.write()?;
        let id = PlanId::new(next(&mut t.last_id.plan));
        let now = Utc::now();
        let plan = Plan {
            id,
            name: plan.name,
            description: plan.description,
            price: plan.price,
            created_at: now,
            updated_at: now,
        };
        t.plans.insert(id, plan.clone());
        Ok(plan)
    }
}

#[async_trait]
impl AppStore for InMemoryStore {
    async fn list_apps(&self, owner: UserId) -> Result<Vec<App>, StoreError> {
        let t = self.read()?;
        Ok(t.apps.values().filter(|a| a.owner == owner).cloned().collect())
    }

    async fn get_app(&self, owner: UserId, id: AppId) -> Result<Option<App>, StoreError> {
        let t = self.read()?;
        Ok(t.apps.get(&id).filter(|a| a.owner == owner).cloned())
    }

    async fn insert_app(&self, owner: UserId, fields: AppFields) -> Result<App, StoreError> {
        let mut t = self.write()?;
        if t.app_name_taken(&fields.name, None) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::AppName));
        }

        let id = AppId::new(next(&mut t.last_id.app));
        let now = Utc::now();
        let app = App {
            id,
            owner,
            fields,
            created_at: now,
            updated_at: now,
        };
        t.apps.insert(id, app.clone());
        Ok(app)
    }

    async fn update_app(&self, owner: UserId, id: AppId, fields: AppFields) -> Result<Option<App>, StoreError> {
        let mut t = self.write()?;
        if !t.apps.get(&id).is_some_and(|a| a.owner == owner) {
            return Ok(None);
        }
        if t.app_name_taken(&fields.name, Some(id)) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::AppName));
        }

        let Some(app) = t.apps.get_mut(&id) else {
            return Ok(None);
        };
        app.fields = fields;
        app.updated_at = Utc::now();
        Ok(Some(app.clone()))
    }

    async fn delete_app_cascade(&self, owner: UserId, id: AppId) -> Result<AppDeletion, StoreError> {
        let mut t = self.write()?;
        if !t.apps.get(&id).is_some_and(|a| a.owner == owner) {
            return Ok(AppDeletion::default());
        }

        let now = Utc::now();
        let mut deactivated = 0;
        for sub in t.subscriptions.values_mut().filter(|s| s.app == id && s.active) {
            deactivated += 1;
            sub.active = false;
            sub.updated_at = now;
        }
        t.apps.remove(&id);

        Ok(AppDeletion {
            removed: true,
            deactivated,
        })
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn list_subscriptions(&self, owner: UserId) -> Result<Vec<Subscription>, StoreError> {
        let t = self.read()?;
        Ok(t.subscriptions.values().filter(|s| s.owner == owner).cloned().collect())
    }

    async fn get_subscription(&self, owner: UserId, id: SubscriptionId) -> Result<Option<Subscription>, StoreError> {
        let t = self.read()?;
        Ok(t.subscriptions.get(&id).filter(|s| s.owner == owner).cloned())
    }

    async fn insert_subscription(&self, owner: UserId, fields: SubscriptionFields) -> Result<Subscription, StoreError> {
        let mut t = self.write()?;
        if !t.owns_app(owner, fields.app) {
            return Err(StoreError::AppNotOwned);
        }
        if t.subscription_exists(owner, fields.app, None) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::SubscriptionUserApp));
        }

        let id = SubscriptionId::new(next(&mut t.last_id.subscription));
        let now = Utc::now();
        let sub = Subscription {
            id,
            owner,
            plan: fields.plan,
            app: fields.app,
            active: fields.active,
            created_at: now,
            updated_at: now,
        };
        t.subscriptions.insert(id, sub.clone());
        Ok(sub)
    }

    async fn update_subscription(
        &self,
        owner: UserId,
        id: SubscriptionId,
        fields: SubscriptionFields,
    ) -> Result<Option<Subscription>, StoreError> {
        let mut t = self.write()?;
        if !t.subscriptions.get(&id).is_some_and(|s| s.owner == owner) {
            return Ok(None);
        }
        if !t.owns_app(owner, fields.app) {
            return Err(StoreError::AppNotOwned);
        }
        if t.subscription_exists(owner, fields.app, Some(id)) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::SubscriptionUserApp));
        }

        let Some(sub) = t.subscriptions.get_mut(&id) else {
            return Ok(None);
        };
        sub.plan = fields.plan;
        sub.app = fields.app;
        sub.active = fields.active;
        sub.updated_at = Utc::now();
        Ok(Some(sub.clone()))
    }
}

#[async_trait]
impl AppOwnership for InMemoryStore {
    async fn app_owner(&self, app: AppId) -> Result<Option<UserId>, LookupError> {
        let t = self
            .tables
            .read()
            .map_err(|_| LookupError("lock poisoned".to_string()))?;
        Ok(t.apps.get(&app).map(|a| a.owner))
    }
}
