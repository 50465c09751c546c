//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Identifier of the user owning this entity, if it is an owned resource.
    ///
    /// Catalog data (plans) has no owner.
    fn owner(&self) -> Option<crate::UserId> {
        None
    }
}
