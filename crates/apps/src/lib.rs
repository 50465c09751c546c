//! Apps domain module.
//!
//! This crate contains the rules for registered applications, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod app;

pub use app::{App, AppFields, AppPatch, AppType, Framework};
