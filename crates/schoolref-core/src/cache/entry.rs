//! Per-collection cache state and the store holding all three entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::CacheError;
use crate::models::{CollectionKind, ItemId, ReferenceItem, NAME_NOT_FOUND};

/// Shared, immutable list handed to callers. Every caller of one fetch
/// receives the same allocation.
pub type Items = Arc<Vec<ReferenceItem>>;

/// Rebuild the id -> name lookup for a list. Ids are keyed by their string
/// form so numeric and string ids resolve alike.
pub fn build_name_index(items: &[ReferenceItem]) -> HashMap<String, String> {
    items
        .iter()
        .map(|item| (item.id.key(), item.name.clone()))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    items: Items,
    name_index: HashMap<String, String>,
    loaded: bool,
    loading: bool,
    last_error: Option<CacheError>,
    fetched_at: Option<DateTime<Utc>>,
    generation: u64,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl CacheEntry {
    pub fn items(&self) -> &Items {
        &self.items
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&CacheError> {
        self.last_error.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure_at(&self) -> Option<Instant> {
        self.last_failure_at
    }

    pub fn name_index(&self) -> &HashMap<String, String> {
        &self.name_index
    }

    /// Look up a display name, `"N/A"` when unknown.
    pub fn resolve_name(&self, id: &ItemId) -> String {
        self.name_index
            .get(&id.key())
            .cloned()
            .unwrap_or_else(|| NAME_NOT_FOUND.to_string())
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            loaded: self.loaded,
            loading: self.loading,
            count: self.items.len(),
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
            fetched_at: self.fetched_at,
        }
    }
}

/// Holds the Schools, Classes and Divisions entries. Items and name index
/// are only ever written together by `set_items`.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: [CacheEntry; 3],
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: CollectionKind) -> &CacheEntry {
        &self.entries[kind.index()]
    }

    fn entry_mut(&mut self, kind: CollectionKind) -> &mut CacheEntry {
        &mut self.entries[kind.index()]
    }

    /// Replace the list after a successful full fetch.
    pub fn set_items(&mut self, kind: CollectionKind, items: Vec<ReferenceItem>) -> Items {
        let entry = self.entry_mut(kind);
        entry.name_index = build_name_index(&items);
        entry.items = Arc::new(items);
        entry.loaded = true;
        entry.loading = false;
        entry.last_error = None;
        entry.fetched_at = Some(Utc::now());
        entry.consecutive_failures = 0;
        entry.last_failure_at = None;
        Arc::clone(&entry.items)
    }

    pub fn set_loading(&mut self, kind: CollectionKind, loading: bool) {
        self.entry_mut(kind).loading = loading;
    }

    /// Record a failed fetch. Items and `loaded` are left as they were so the
    /// last good list stays visible.
    pub fn set_error(&mut self, kind: CollectionKind, error: CacheError) {
        let entry = self.entry_mut(kind);
        entry.last_error = Some(error);
        entry.loading = false;
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.last_failure_at = Some(Instant::now());
    }

    /// Mark an entry as needing a fetch and start a new generation.
    /// Returns the new generation.
    pub fn invalidate(&mut self, kind: CollectionKind) -> u64 {
        let entry = self.entry_mut(kind);
        entry.loaded = false;
        entry.generation += 1;
        entry.generation
    }

    pub fn resolve_name(&self, kind: CollectionKind, id: &ItemId) -> String {
        self.get(kind).resolve_name(id)
    }
}

/// Debug view of one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub loaded: bool,
    pub loading: bool,
    pub count: usize,
    pub last_error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl EntrySnapshot {
    pub fn age_minutes(&self) -> Option<i64> {
        self.fetched_at.map(|at| (Utc::now() - at).num_minutes())
    }

    pub fn age_display(&self) -> String {
        let Some(minutes) = self.age_minutes() else {
            return "never".to_string();
        };
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Delay still to wait before another attempt is allowed, if any.
pub(crate) fn backoff_remaining(
    entry: &CacheEntry,
    base: Duration,
    max: Duration,
    now: Instant,
) -> Option<Duration> {
    let failed_at = entry.last_failure_at?;
    if entry.consecutive_failures == 0 {
        return None;
    }
    let exponent = (entry.consecutive_failures - 1).min(16);
    let window = base.saturating_mul(1u32 << exponent).min(max);
    let elapsed = now.saturating_duration_since(failed_at);
    window.checked_sub(elapsed).filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use chrono::Duration as ChronoDuration;

    fn classes() -> Vec<ReferenceItem> {
        vec![
            ReferenceItem::new(10, "Grade 1"),
            ReferenceItem::new("11", "Grade 2"),
        ]
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = EntryStore::new();
        for kind in CollectionKind::ALL {
            assert!(!store.get(kind).is_loaded());
            assert!(store.get(kind).items().is_empty());
        }
    }

    #[test]
    fn test_set_items_rebuilds_index_and_marks_loaded() {
        let mut store = EntryStore::new();
        store.set_items(CollectionKind::Classes, classes());
        let entry = store.get(CollectionKind::Classes);
        assert!(entry.is_loaded());
        assert_eq!(entry.name_index().len(), 2);
        assert_eq!(store.resolve_name(CollectionKind::Classes, &ItemId::from("10")), "Grade 1");
        assert_eq!(store.resolve_name(CollectionKind::Classes, &ItemId::Int(11)), "Grade 2");

        store.set_items(CollectionKind::Classes, vec![ReferenceItem::new(12, "Grade 3")]);
        assert_eq!(store.resolve_name(CollectionKind::Classes, &ItemId::Int(10)), NAME_NOT_FOUND);
    }

    #[test]
    fn test_resolve_name_miss_is_sentinel() {
        let store = EntryStore::new();
        assert_eq!(store.resolve_name(CollectionKind::Schools, &ItemId::Int(1)), "N/A");
    }

    #[test]
    fn test_error_keeps_stale_items() {
        let mut store = EntryStore::new();
        store.set_items(CollectionKind::Classes, classes());
        store.set_error(
            CollectionKind::Classes,
            CacheError::transport(CollectionKind::Classes, ApiError::Unauthorized),
        );
        let entry = store.get(CollectionKind::Classes);
        assert!(entry.is_loaded());
        assert_eq!(entry.items().len(), 2);
        assert_eq!(entry.consecutive_failures(), 1);
        assert!(entry.last_error().is_some());

        store.set_items(CollectionKind::Classes, classes());
        assert!(store.get(CollectionKind::Classes).last_error().is_none());
        assert_eq!(store.get(CollectionKind::Classes).consecutive_failures(), 0);
    }

    #[test]
    fn test_invalidate_bumps_generation() {
        let mut store = EntryStore::new();
        store.set_items(CollectionKind::Schools, vec![ReferenceItem::new(1, "North")]);
        assert_eq!(store.invalidate(CollectionKind::Schools), 1);
        assert!(!store.get(CollectionKind::Schools).is_loaded());
        assert_eq!(store.get(CollectionKind::Schools).items().len(), 1);
    }

    #[test]
    fn test_snapshot_age_display() {
        let mut snapshot = EntrySnapshot {
            loaded: true,
            loading: false,
            count: 1,
            last_error: None,
            fetched_at: Some(Utc::now()),
        };
        assert_eq!(snapshot.age_display(), "just now");
        snapshot.fetched_at = Some(Utc::now() - ChronoDuration::minutes(5));
        assert_eq!(snapshot.age_display(), "5m ago");
        snapshot.fetched_at = Some(Utc::now() - ChronoDuration::minutes(95));
        assert_eq!(snapshot.age_display(), "2h ago");
        snapshot.fetched_at = None;
        assert_eq!(snapshot.age_display(), "never");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_window_doubles_and_caps() {
        let mut store = EntryStore::new();
        let err = CacheError::transport(CollectionKind::Schools, ApiError::RateLimited);
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(300);

        store.set_error(CollectionKind::Schools, err.clone());
        let entry = store.get(CollectionKind::Schools);
        assert_eq!(backoff_remaining(entry, base, max, Instant::now()), Some(base));

        store.set_error(CollectionKind::Schools, err.clone());
        store.set_error(CollectionKind::Schools, err);
        let entry = store.get(CollectionKind::Schools);
        assert_eq!(backoff_remaining(entry, base, max, Instant::now()), Some(max));

        tokio::time::advance(Duration::from_millis(301)).await;
        assert_eq!(backoff_remaining(entry, base, max, Instant::now()), None);
    }
}
