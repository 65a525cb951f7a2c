//! Identity extraction for deduplication.

use std::{fmt::Debug, hash::Hash};

use uuid::Uuid;

/// An entity with a unique, stable identifier.
///
/// Two values with equal ids are treated as the same entity by
/// [`PagedCollection`](crate::PagedCollection), whatever their other fields.
pub trait Identified {
    /// Identifier type.
    type Id: Eq + Hash + Clone + Debug;

    /// Returns this entity's identifier.
    fn id(&self) -> Self::Id;
}

/// Bare id lists (friends, members) are their own identity.
impl Identified for Uuid {
    type Id = Self;

    fn id(&self) -> Self::Id {
        *self
    }
}
