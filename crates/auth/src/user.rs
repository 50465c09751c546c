//! User accounts (signup + credential check).
//!
//! Accounts are referenced by the rest of the system only through [`UserId`];
//! nothing outside this module reads or mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenantry_core::{DomainError, DomainResult, Entity, UserId};

use crate::password::PasswordHash;

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PASSWORD_MIN_LEN: usize = 8;

/// A registered user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub date_joined: DateTime<Utc>,
}

impl UserAccount {
    pub fn check_password(&self, password: &str) -> bool {
        self.password_hash.verify(password)
    }
}

impl Entity for UserAccount {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Signup request as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Signup {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Validated account, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
}

impl Signup {
    /// Validate the request and hash the password.
    ///
    /// Username/email uniqueness is enforced by the store.
    pub fn into_account(self) -> DomainResult<NewAccount> {
        let username = self.username.trim().to_string();
        validate_username(&username)?;

        let email = self.email.trim().to_string();
        validate_email(&email)?;

        if self.password.chars().count() < PASSWORD_MIN_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {PASSWORD_MIN_LEN} characters"
            )));
        }
        if self.password.eq_ignore_ascii_case(&username) {
            return Err(DomainError::validation("password is too similar to the username"));
        }

        Ok(NewAccount {
            username,
            email,
            password_hash: PasswordHash::generate(&self.password)?,
        })
    }
}

fn validate_username(username: &str) -> DomainResult<()> {
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
        return Err(DomainError::validation(format!(
            "username must be 1..={USERNAME_MAX_LEN} characters"
        )));
    }
    let allowed = |c: char| c.is_alphanumeric() || c == ' ' || "@.+-_".contains(c);
    if !username.chars().all(allowed) {
        return Err(DomainError::validation(
            "username may contain only letters, digits, spaces and @/./+/-/_",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> DomainResult<()> {
    let invalid = || DomainError::validation("enter a valid email address");

    if email.chars().count() > EMAIL_MAX_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(())
}
