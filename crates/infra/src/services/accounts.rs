use std::sync::Arc;

use chrono::Utc;

use tenantry_auth::{Hs256JwtIssuer, Signup, UserAccount};

use super::{RegistryError, RegistryResult};
use crate::store::{SharedStore, StoreError};

const BAD_CREDENTIALS: &str = "unable to log in with provided credentials";

/// A successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserAccount,
}

/// Signup and login. The only operations reachable without a credential.
#[derive(Clone)]
pub struct Accounts {
    store: SharedStore,
    issuer: Arc<Hs256JwtIssuer>,
}

impl Accounts {
    pub fn new(store: SharedStore, issuer: Hs256JwtIssuer) -> Self {
        Self {
            store,
            issuer: Arc::new(issuer),
        }
    }

    pub async fn signup(&self, signup: Signup) -> RegistryResult<UserAccount> {
        let account = signup.into_account()?;

        let user = self.store.insert_user(account).await.map_err(|e| match e {
            // Duplicate usernames and emails are ordinary form errors here.
            StoreError::UniqueViolation(c) => RegistryError::Validation(c.describe().to_string()),
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> RegistryResult<Session> {
        let user = self
            .store
            .find_user_by_username(username.trim())
            .await?
            .filter(|u| u.check_password(password));

        let Some(user) = user else {
            tracing::debug!(username, "login rejected");
            return Err(RegistryError::Validation(BAD_CREDENTIALS.to_string()));
        };

        let token = self
            .issuer
            .issue(user.id, Utc::now())
            .map_err(|e| RegistryError::Store(format!("token issue failed: {e}")))?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(Session { token, user })
    }
}
