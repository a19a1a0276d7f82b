//! In-flight fetch registry.
//!
//! At most one fetch runs per `(collection, filter)` key. The first caller
//! registers a shared future before anything is awaited; later callers get a
//! clone of it and never invoke their loader. The slot is released when the
//! fetch settles, whether it succeeded, failed, or the task was torn down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::{CacheError, Items};
use crate::models::{CollectionKind, ItemId};

/// Result shared by every awaiter of one fetch.
pub type FetchResult = Result<Items, CacheError>;

/// Pending fetch handle. Cloning it joins the same fetch.
pub type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Filter signature of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterKey {
    /// Unfiltered list of the whole collection.
    All,
    /// List scoped by a parent id, e.g. `school:4`.
    Parent(String),
}

impl FilterKey {
    pub fn school(school_id: &ItemId) -> Self {
        FilterKey::Parent(format!("school:{}", school_id.key()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub kind: CollectionKind,
    pub filter: FilterKey,
}

impl FetchKey {
    pub fn all(kind: CollectionKind) -> Self {
        Self {
            kind,
            filter: FilterKey::All,
        }
    }

    pub fn scoped(kind: CollectionKind, filter: FilterKey) -> Self {
        Self { kind, filter }
    }
}

struct Slot {
    ticket: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
pub struct InFlightRegistry {
    slots: Mutex<HashMap<FetchKey, Slot>>,
    next_ticket: AtomicU64,
}

/// Releases a slot when dropped, so a settled, panicked or abandoned fetch
/// never leaves its key occupied.
struct SlotRelease {
    registry: Arc<InFlightRegistry>,
    key: FetchKey,
    ticket: u64,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.ticket);
    }
}

impl InFlightRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<FetchKey, Slot>> {
        // A poisoned map only means a panic elsewhere; the map itself is intact
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Join the fetch already running for `key`, or start one with `loader`.
    ///
    /// `loader` is only called when no fetch is in flight. It must build a
    /// lazy future and must not call back into this registry.
    pub fn fetch_once<F>(self: &Arc<Self>, key: FetchKey, loader: F) -> SharedFetch
    where
        F: FnOnce() -> BoxFuture<'static, FetchResult>,
    {
        let mut slots = self.slots();
        if let Some(slot) = slots.get(&key) {
            debug!(collection = %key.kind, filter = ?key.filter, "Joining in-flight fetch");
            return slot.fetch.clone();
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let release = SlotRelease {
            registry: Arc::clone(self),
            key: key.clone(),
            ticket,
        };
        let pending = loader();
        let fetch = async move {
            let _release = release;
            pending.await
        }
        .boxed()
        .shared();

        slots.insert(
            key,
            Slot {
                ticket,
                fetch: fetch.clone(),
            },
        );
        drop(slots);

        // Drive the fetch to completion even if every awaiter goes away
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(fetch.clone().map(|_| ()));
        }
        fetch
    }

    fn release(&self, key: &FetchKey, ticket: u64) {
        // Removed slots are dropped after the lock is released
        let removed = {
            let mut slots = self.slots();
            match slots.get(key) {
                Some(slot) if slot.ticket == ticket => slots.remove(key),
                _ => None,
            }
        };
        drop(removed);
    }

    /// Detach the current fetch for `key` so the next caller starts a new
    /// one. The detached fetch still completes for its own awaiters.
    pub fn forget(&self, key: &FetchKey) -> bool {
        let removed = self.slots().remove(key);
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &FetchKey) -> bool {
        self.slots().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::models::ReferenceItem;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        result: FetchResult,
    ) -> impl FnOnce() -> BoxFuture<'static, FetchResult> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                result
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let registry = InFlightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let items: Items = Arc::new(vec![ReferenceItem::new(1, "A")]);
        let key = FetchKey::all(CollectionKind::Divisions);

        let fetches: Vec<_> = (0..5)
            .map(|_| registry.fetch_once(key.clone(), counting_loader(&calls, Ok(Arc::clone(&items)))))
            .collect();
        assert_eq!(registry.len(), 1);

        let results = futures::future::join_all(fetches).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_slot_released() {
        let registry = InFlightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = FetchKey::all(CollectionKind::Schools);
        let err = CacheError::transport(CollectionKind::Schools, ApiError::Unauthorized);

        let a = registry.fetch_once(key.clone(), counting_loader(&calls, Err(err.clone())));
        let b = registry.fetch_once(key.clone(), counting_loader(&calls, Err(err)));
        let (a, b) = futures::join!(a, b);
        assert!(a.is_err() && b.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry.contains(&key));

        // Next call after settlement starts a new fetch
        let c = registry.fetch_once(key, counting_loader(&calls, Ok(Arc::new(Vec::new()))));
        assert!(c.await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_filters_do_not_share() {
        let registry = InFlightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let a = FetchKey::scoped(CollectionKind::Classes, FilterKey::school(&ItemId::Int(1)));
        let b = FetchKey::scoped(CollectionKind::Classes, FilterKey::school(&ItemId::Int(2)));

        let fa = registry.fetch_once(a, counting_loader(&calls, Ok(Arc::new(Vec::new()))));
        let fb = registry.fetch_once(b, counting_loader(&calls, Ok(Arc::new(Vec::new()))));
        assert_eq!(registry.len(), 2);
        let _ = futures::join!(fa, fb);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_school_filter_key_coerces_id() {
        assert_eq!(
            FilterKey::school(&ItemId::Int(3)),
            FilterKey::school(&ItemId::from("3"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_lets_new_fetch_start_and_old_release_is_ignored() {
        let registry = InFlightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = FetchKey::all(CollectionKind::Classes);

        let old = registry.fetch_once(key.clone(), counting_loader(&calls, Ok(Arc::new(Vec::new()))));
        assert!(registry.forget(&key));
        let new = registry.fetch_once(key.clone(), move || {
            async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(Arc::new(Vec::new()))
            }
            .boxed()
        });

        assert!(old.await.is_ok());
        // The old fetch settling must not clear the new slot
        assert!(registry.contains(&key));
        assert!(new.await.is_ok());
        assert!(!registry.contains(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_still_releases() {
        let registry = InFlightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = FetchKey::all(CollectionKind::Schools);

        drop(registry.fetch_once(key.clone(), counting_loader(&calls, Ok(Arc::new(Vec::new())))));
        assert!(registry.contains(&key));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!registry.contains(&key));
    }
}
