//! Data models for school reference data.
//!
//! This module contains the structures used to represent the three
//! reference collections and the identity of the current user:
//!
//! - `ReferenceItem`, `ItemId`: one School, Class or Division row
//! - `CollectionKind`: which of the three collections a row belongs to
//! - `UserProfile`, `Role`, `Allocation`: session identity and teacher allocations
//! - `aliases`: the declared field-name alias table used to normalize raw rows

pub mod aliases;
pub mod item;
pub mod profile;

pub use aliases::{resolve_parent_key, ParentKey};
pub use item::{CollectionKind, ItemId, ReferenceItem, NAME_NOT_FOUND};
pub use profile::{Allocation, Role, UserProfile};
