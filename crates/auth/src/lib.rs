//! `tenantry-auth`: authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: resolves
//! credentials to user identities and decides ownership questions through
//! injected lookups.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod user;

pub use authorize::{AppOwnership, AuthzError, LookupError, OwnershipGuard};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtIssuer, Hs256JwtValidator, JwtError, JwtValidator};
pub use password::PasswordHash;
pub use principal::{AuthnError, Credential, IdentityResolver, JwtIdentityResolver};
pub use user::{NewAccount, Signup, UserAccount};
