//! Hierarchical filtering and role-scoped views.
//!
//! - `filter`: pure projections of the cached lists ("classes of school X")
//! - `Scope`: teacher restriction derived from the session profile
//! - `Selection`: school/class/division form state with cascade resets

pub mod filter;
pub mod selection;

pub use filter::{classes_of, divisions_of, Scope, TeacherScope};
pub use selection::Selection;
