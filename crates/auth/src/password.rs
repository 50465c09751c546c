//! Password digests.
//!
//! Stored as Argon2id PHC strings (`$argon2id$v=19$m=..,t=..,p=..$<salt>$<hash>`),
//! so parameters and salt travel with the digest.

use core::str::FromStr;

use argon2::password_hash::{PasswordHash as PhcString, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};

use tenantry_core::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PasswordHash {
    phc: String,
}

impl PasswordHash {
    /// Hash `password` with a fresh random salt.
    pub fn generate(password: &str) -> DomainResult<Self> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let phc = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DomainError::validation(format!("password could not be hashed: {e}")))?
            .to_string();
        Ok(Self { phc })
    }

    pub fn verify(&self, password: &str) -> bool {
        match PhcString::new(&self.phc) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl core::fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.phc)
    }
}

impl FromStr for PasswordHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = PhcString::new(s)
            .map_err(|e| DomainError::validation(format!("unsupported password hash format: {e}")))?;
        if !parsed.algorithm.as_str().starts_with("argon2") || parsed.hash.is_none() {
            return Err(DomainError::validation("unsupported password hash format"));
        }
        Ok(Self { phc: s.to_string() })
    }
}

impl TryFrom<String> for PasswordHash {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PasswordHash> for String {
    fn from(value: PasswordHash) -> Self {
        value.phc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_the_original_password_only() {
        let hash = PasswordHash::generate("password1").unwrap();
        assert!(hash.verify("password1"));
        assert!(!hash.verify("password2"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = PasswordHash::generate("password1").unwrap();
        let b = PasswordHash::generate("password1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn stored_form_is_an_argon2id_phc_string() {
        let hash = PasswordHash::generate("password1").unwrap();
        let stored = hash.to_string();
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("password1"));

        let loaded: PasswordHash = stored.parse().unwrap();
        assert!(loaded.verify("password1"));
    }

    #[test]
    fn rejects_unknown_formats() {
        assert!("sha256$abc$def".parse::<PasswordHash>().is_err());
        assert!("$md5$abc".parse::<PasswordHash>().is_err());
        assert!("".parse::<PasswordHash>().is_err());
    }
}
