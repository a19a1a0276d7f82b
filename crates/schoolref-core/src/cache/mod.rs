//! In-memory reference data cache.
//!
//! This module provides `ReferenceCache`, which fetches, memoizes and
//! deduplicates the Schools, Classes and Divisions collections for the
//! lifetime of a session. State is held in memory only.
//!
//! - `entry`: per-collection state and the store that mutates it
//! - `inflight`: one-fetch-per-key registry
//! - `manager`: the public facade consumed by forms and selectors

pub mod entry;
pub mod error;
pub mod inflight;
pub mod manager;

pub use entry::{build_name_index, CacheEntry, EntrySnapshot, EntryStore, Items};
pub use error::CacheError;
pub use inflight::{FetchKey, FilterKey, InFlightRegistry, SharedFetch};
pub use manager::{CacheOptions, CacheStats, ReferenceCache, ReferenceCacheBuilder, RetryPolicy};
