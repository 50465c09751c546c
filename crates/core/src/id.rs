//! Strongly-typed identifiers used across the domain.
//!
//! Every persisted record is keyed by a store-assigned serial integer. The
//! newtypes keep an `AppId` from being passed where a `PlanId` is expected.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a user (resource owner).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Identifier of a registered application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(i64);

/// Identifier of a subscription plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(i64);

/// Identifier of a subscription.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(i64);

macro_rules! impl_serial_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = i64::from_str(s.trim())
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                if value <= 0 {
                    return Err(DomainError::invalid_id(format!("{}: must be positive", $name)));
                }
                Ok(Self(value))
            }
        }
    };
}

impl_serial_newtype!(UserId, "UserId");
impl_serial_newtype!(AppId, "AppId");
impl_serial_newtype!(PlanId, "PlanId");
impl_serial_newtype!(SubscriptionId, "SubscriptionId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids_from_path_segments() {
        assert_eq!("42".parse::<AppId>().unwrap(), AppId::new(42));
        assert_eq!(" 7 ".parse::<UserId>().unwrap().get(), 7);
    }

    #[test]
    fn rejects_non_numeric_and_non_positive_ids() {
        assert!(matches!("abc".parse::<PlanId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("0".parse::<SubscriptionId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("-3".parse::<AppId>(), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&UserId::new(2)).unwrap();
        assert_eq!(json, "2");
        let back: UserId = serde_json::from_str("2").unwrap();
        assert_eq!(back, UserId::new(2));
    }
}
