//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | Constraint / Code | StoreError |
//! |------------|-------------------|------------|
//! | Database `23505` on `users_username_key` | unique | `UniqueViolation(Username)` |
//! | Database `23505` on `users_email_lower_key` | unique | `UniqueViolation(Email)` |
//! | Database `23505` on `apps_name_key` | unique | `UniqueViolation(AppName)` |
//! | Database `23505` on `subscriptions_user_app_key` | unique | `UniqueViolation(SubscriptionUserApp)` |
//! | Anything else | | `Backend` |
//!
//! Subscription writes share-lock the referenced app row in the same
//! transaction and return `AppNotOwned` when the caller does not own it.
//!
//! Owner scoping is part of every `WHERE` clause; rows belonging to another
//! user are never loaded.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::{instrument, Span};

use tenantry_apps::{App, AppFields, AppType, Framework};
use tenantry_auth::{AppOwnership, LookupError, NewAccount, PasswordHash, UserAccount};
use tenantry_core::{AppId, PlanId, SubscriptionId, UserId};
use tenantry_subscriptions::{NewPlan, Plan, Price, Subscription, SubscriptionFields};

use super::{
    AppDeletion, AppStore, PlanStore, StoreError, SubscriptionStore, UniqueConstraint, UserStore,
};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, account), fields(username = %account.username), err)]
    async fn insert_user(&self, account: NewAccount) -> Result<UserAccount, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, date_joined
            "#,
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(account.password_hash.to_string())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        UserAccount::try_from(decode::<UserRow>(&row)?)
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, date_joined FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_username", e))?;

        row.map(|r| UserAccount::try_from(decode::<UserRow>(&r)?)).transpose()
    }
}

#[async_trait]
impl PlanStore for PostgresStore {
    #[instrument(skip(self), fields(plan_count = tracing::field::Empty), err)]
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, description, price_cents, created_at, updated_at FROM plans ORDER BY id ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_plans", e))?;

        let plans = rows
            .iter()
            .map(|r| Plan::try_from(decode::<PlanRow>(r)?))
            .collect::<Result<Vec<Plan>, StoreError>>()?;
        Span::current().record("plan_count", plans.len());
        Ok(plans)
    }

    #[instrument(skip(self), fields(plan_id = %id), err)]
    async fn get_plan(&self, id: PlanId) -> Result<Option<Plan>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, price_cents, created_at, updated_at FROM plans WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_plan", e))?;

        row.map(|r| Plan::try_from(decode::<PlanRow>(&r)?)).transpose()
    }

    #[instrument(skip(self, plan), fields(name = %plan.name), err)]
    async fn insert_plan(&self, plan: NewPlan) -> Result<Plan, StoreError> {
        let price_cents = i32::try_from(plan.price.cents())
            .map_err(|_| StoreError::Backend(format!("price out of range: {}", plan.price)))?;

        let row = sqlx::query(
            r#"
            INSERT INTO plans (name, description, price_cents)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, price_cents, created_at, updated_at
            "#,
        )
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(price_cents)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_plan", e))?;

        Plan::try_from(decode::<PlanRow>(&row)?)
    }
}

const APP_COLUMNS: &str =
    "id, owner_id, name, description, app_type, framework, domain_name, screenshot, created_at, updated_at";

#[async_trait]
impl AppStore for PostgresStore {
    #[instrument(skip(self), fields(owner = %owner, app_count = tracing::field::Empty), err)]
    async fn list_apps(&self, owner: UserId) -> Result<Vec<App>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {APP_COLUMNS} FROM apps WHERE owner_id = $1 ORDER BY id ASC"
        ))
        .bind(owner.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_apps", e))?;

        let apps = rows
            .iter()
            .map(|r| App::try_from(decode::<AppRow>(r)?))
            .collect::<Result<Vec<App>, StoreError>>()?;
        Span::current().record("app_count", apps.len());
        Ok(apps)
    }

    #[instrument(skip(self), fields(owner = %owner, app_id = %id), err)]
    async fn get_app(&self, owner: UserId, id: AppId) -> Result<Option<App>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {APP_COLUMNS} FROM apps WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id.get())
        .bind(owner.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_app", e))?;

        row.map(|r| App::try_from(decode::<AppRow>(&r)?)).transpose()
    }

    #[instrument(skip(self, app), fields(owner = %owner, name = %app.name), err)]
    async fn insert_app(&self, owner: UserId, app: AppFields) -> Result<App, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO apps (owner_id, name, description, app_type, framework, domain_name, screenshot)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {APP_COLUMNS}
            "#
        ))
        .bind(owner.get())
        .bind(&app.name)
        .bind(&app.description)
        .bind(app.app_type.as_str())
        .bind(app.framework.as_str())
        .bind(&app.domain_name)
        .bind(&app.screenshot)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_app", e))?;

        App::try_from(decode::<AppRow>(&row)?)
    }

    #[instrument(skip(self, app), fields(owner = %owner, app_id = %id), err)]
    async fn update_app(&self, owner: UserId, id: AppId, app: AppFields) -> Result<Option<App>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE apps
            SET name = $3, description = $4, app_type = $5, framework = $6,
                domain_name = $7, screenshot = $8, updated_at = now()
            WHERE id = $1 AND owner_id = $2
            RETURNING {APP_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(owner.get())
        .bind(&app.name)
        .bind(&app.description)
        .bind(app.app_type.as_str())
        .bind(app.framework.as_str())
        .bind(&app.domain_name)
        .bind(&app.screenshot)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_app", e))?;

        row.map(|r| App::try_from(decode::<AppRow>(&r)?)).transpose()
    }

    #[instrument(
        skip(self),
        fields(owner = %owner, app_id = %id, deactivated = tracing::field::Empty),
        err
    )]
    async fn delete_app_cascade(&self, owner: UserId, id: AppId) -> Result<AppDeletion, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let owned = sqlx::query("SELECT id FROM apps WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(id.get())
            .bind(owner.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_app", e))?;

        if owned.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(AppDeletion::default());
        }

        let deactivated = sqlx::query(
            "UPDATE subscriptions SET active = false, updated_at = now() WHERE app_id = $1 AND active",
        )
        .bind(id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("deactivate_subscriptions", e))?
        .rows_affected();

        sqlx::query("DELETE FROM apps WHERE id = $1 AND owner_id = $2")
            .bind(id.get())
            .bind(owner.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_app", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("deactivated", deactivated);
        Ok(AppDeletion {
            removed: true,
            deactivated: deactivated as usize,
        })
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, app_id, active, created_at, updated_at";

#[async_trait]
impl SubscriptionStore for PostgresStore {
    #[instrument(skip(self), fields(owner = %owner), err)]
    async fn list_subscriptions(&self, owner: UserId) -> Result<Vec<Subscription>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1 ORDER BY id ASC"
        ))
        .bind(owner.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_subscriptions", e))?;

        rows.iter()
            .map(|r| decode::<SubscriptionRow>(r).map(Subscription::from))
            .collect()
    }

    #[instrument(skip(self), fields(owner = %owner, subscription_id = %id), err)]
    async fn get_subscription(&self, owner: UserId, id: SubscriptionId) -> Result<Option<Subscription>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1 AND user_id = $2"
        ))
        .bind(id.get())
        .bind(owner.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_subscription", e))?;

        row.map(|r| decode::<SubscriptionRow>(&r).map(Subscription::from)).transpose()
    }

    #[instrument(skip(self), fields(owner = %owner, app_id = %fields.app, plan_id = %fields.plan), err)]
    async fn insert_subscription(&self, owner: UserId, fields: SubscriptionFields) -> Result<Subscription, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if !lock_owned_app(&mut tx, owner, fields.app).await? {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::AppNotOwned);
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (user_id, plan_id, app_id, active)
            VALUES ($1, $2, $3, $4)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(owner.get())
        .bind(fields.plan.get())
        .bind(fields.app.get())
        .bind(fields.active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_subscription", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        decode::<SubscriptionRow>(&row).map(Subscription::from)
    }

    #[instrument(skip(self), fields(owner = %owner, subscription_id = %id), err)]
    async fn update_subscription(
        &self,
        owner: UserId,
        id: SubscriptionId,
        fields: SubscriptionFields,
    ) -> Result<Option<Subscription>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let existing = sqlx::query("SELECT id FROM subscriptions WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id.get())
            .bind(owner.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_subscription", e))?;

        if existing.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        }

        if !lock_owned_app(&mut tx, owner, fields.app).await? {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::AppNotOwned);
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET plan_id = $3, app_id = $4, active = $5, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(owner.get())
        .bind(fields.plan.get())
        .bind(fields.app.get())
        .bind(fields.active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_subscription", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        decode::<SubscriptionRow>(&row).map(Subscription::from).map(Some)
    }
}

/// Share-lock the app row if `owner` owns it.
///
/// Conflicts with the `FOR UPDATE` taken by [`AppStore::delete_app_cascade`], so
/// a subscription write and an app delete on the same app are serialized.
async fn lock_owned_app(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    owner: UserId,
    app: AppId,
) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT id FROM apps WHERE id = $1 AND owner_id = $2 FOR SHARE")
        .bind(app.get())
        .bind(owner.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_app", e))?;
    Ok(row.is_some())
}

#[async_trait]
impl AppOwnership for PostgresStore {
    #[instrument(skip(self), fields(app_id = %app), err)]
    async fn app_owner(&self, app: AppId) -> Result<Option<UserId>, LookupError> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT owner_id FROM apps WHERE id = $1")
            .bind(app.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| LookupError(map_sqlx_error("app_owner", e).to_string()))?;
        Ok(owner.map(UserId::new))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                if let Some(constraint) = db_err.constraint().and_then(unique_constraint) {
                    return StoreError::UniqueViolation(constraint);
                }
            }
            StoreError::Backend(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        other => StoreError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}

fn unique_constraint(name: &str) -> Option<UniqueConstraint> {
    match name {
        "users_username_key" => Some(UniqueConstraint::Username),
        "users_email_lower_key" => Some(UniqueConstraint::Email),
        "apps_name_key" => Some(UniqueConstraint::AppName),
        "subscriptions_user_app_key" => Some(UniqueConstraint::SubscriptionUserApp),
        _ => None,
    }
}

fn decode<T>(row: &PgRow) -> Result<T, StoreError>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt {what} row: {detail}"))
}

// SQLx row types

#[derive(Debug)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    date_joined: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            date_joined: row.try_get("date_joined")?,
        })
    }
}

impl TryFrom<UserRow> for UserAccount {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let password_hash: PasswordHash = row.password_hash.parse().map_err(|e| corrupt("user", e))?;
        Ok(UserAccount {
            id: UserId::new(row.id),
            username: row.username,
            email: row.email,
            password_hash,
            date_joined: row.date_joined,
        })
    }
}

#[derive(Debug)]
struct PlanRow {
    id: i64,
    name: String,
    description: String,
    price_cents: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PlanRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PlanRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price_cents: row.try_get("price_cents")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<PlanRow> for Plan {
    type Error = StoreError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let cents = u32::try_from(row.price_cents).map_err(|e| corrupt("plan", e))?;
        Ok(Plan {
            id: PlanId::new(row.id),
            name: row.name,
            description: row.description,
            price: Price::from_cents(cents).map_err(|e| corrupt("plan", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct AppRow {
    id: i64,
    owner_id: i64,
    name: String,
    description: String,
    app_type: String,
    framework: String,
    domain_name: Option<String>,
    screenshot: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AppRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AppRow {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            app_type: row.try_get("app_type")?,
            framework: row.try_get("framework")?,
            domain_name: row.try_get("domain_name")?,
            screenshot: row.try_get("screenshot")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<AppRow> for App {
    type Error = StoreError;

    fn try_from(row: AppRow) -> Result<Self, Self::Error> {
        Ok(App {
            id: AppId::new(row.id),
            owner: UserId::new(row.owner_id),
            fields: AppFields {
                name: row.name,
                description: row.description,
                app_type: AppType::parse(&row.app_type).map_err(|e| corrupt("app", e))?,
                framework: Framework::parse(&row.framework).map_err(|e| corrupt("app", e))?,
                domain_name: row.domain_name,
                screenshot: row.screenshot,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct SubscriptionRow {
    id: i64,
    user_id: i64,
    plan_id: i64,
    app_id: i64,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for SubscriptionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SubscriptionRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            plan_id: row.try_get("plan_id")?,
            app_id: row.try_get("app_id")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            id: SubscriptionId::new(row.id),
            owner: UserId::new(row.user_id),
            plan: PlanId::new(row.plan_id),
            app: AppId::new(row.app_id),
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
