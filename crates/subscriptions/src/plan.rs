use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use tenantry_core::{DomainError, DomainResult, Entity, PlanId, ValueObject};

pub const NAME_MAX_LEN: usize = 20;
pub const DESCRIPTION_MAX_LEN: usize = 50;

/// Plan price, stored in cents.
///
/// Mirrors a `DECIMAL(5, 2)` column: at most three integer digits and two
/// decimal places. Serialized as a string (`"10.00"`) so no precision is lost
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u32);

impl Price {
    pub const MAX_CENTS: u32 = 99_999;

    pub fn from_cents(cents: u32) -> DomainResult<Self> {
        if cents > Self::MAX_CENTS {
            return Err(DomainError::validation("price must be below 1000.00"));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> u32 {
        self.0
    }
}

impl ValueObject for Price {}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DomainError::validation(format!("\"{s}\" is not a valid price"));

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let frac_cents: u32 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u32>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(invalid)?;
        Price::from_cents(cents)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(u64),
            Float(f64),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Int(n) => n.to_string(),
            Raw::Float(f) => format!("{f:.2}"),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Subscription plan (read-only catalog entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Plan {
    type Id = PlanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Plan definition used by administrative seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlan {
    pub name: String,
    pub description: String,
    pub price: Price,
}

impl NewPlan {
    pub fn new(name: impl Into<String>, description: impl Into<String>, price: Price) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() || self.name.chars().count() > NAME_MAX_LEN {
            return Err(DomainError::validation(format!(
                "plan name must be 1..={NAME_MAX_LEN} characters"
            )));
        }
        if self.description.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(DomainError::validation(format!(
                "plan description must be at most {DESCRIPTION_MAX_LEN} characters"
            )));
        }
        Ok(())
    }
}
