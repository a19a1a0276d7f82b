//! Core library for schoolref.
//!
//! Fetches, memoizes and deduplicates the school reference collections
//! (Schools, Classes, Divisions) and derives the parent-scoped and
//! role-scoped views that selectors and forms display.
//!
//! - `api`: transport trait, paging and the HTTP client
//! - `cache`: entry store, in-flight registry and the `ReferenceCache` facade
//! - `scope`: hierarchy filters, teacher scope, cascade selection
//! - `models`: reference rows, ids, alias table, user profile
//! - `config`: client settings
//! - `notify`: failure notification sink

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod notify;
pub mod scope;

pub use api::{ApiClient, ApiError, Transport};
pub use cache::{CacheError, CacheOptions, CacheStats, Items, ReferenceCache, RetryPolicy};
pub use config::Config;
pub use models::{Allocation, CollectionKind, ItemId, ReferenceItem, Role, UserProfile};
pub use notify::{LogNotifier, Notifier};
pub use scope::{Scope, Selection};
