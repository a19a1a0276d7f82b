use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::entry::{backoff_remaining, EntrySnapshot, EntryStore, Items};
use super::inflight::{FetchKey, FetchResult, FilterKey, InFlightRegistry, SharedFetch};
use super::CacheError;
use crate::api::{fetch_all_pages, ApiError, ParentFilter, Transport};
use crate::models::{CollectionKind, ItemId, ReferenceItem, UserProfile};
use crate::notify::{LogNotifier, Notifier};
use crate::scope::{classes_of, divisions_of, Scope};

/// Upper bound for the delay between retries of a failing collection.
const DEFAULT_MAX_RETRY_BACKOFF_SECS: u64 = 60;

const DEFAULT_PAGE_SIZE: u32 = 1000;

const DEFAULT_MAX_PAGES: u32 = 20;

/// Delay applied after failed full fetches. With `base: None` every call
/// retries immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Option<Duration>,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: None,
            max: Duration::from_secs(DEFAULT_MAX_RETRY_BACKOFF_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub page_size: u32,
    pub max_pages: u32,
    pub retry: RetryPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
        }
    }
}

/// Item counts and the number of fetch keys currently in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub schools: usize,
    pub classes: usize,
    pub divisions: usize,
    pub ongoing_fetches: usize,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Mutex<EntryStore>,
    registry: Arc<InFlightRegistry>,
    profile: RwLock<UserProfile>,
    notifier: Arc<dyn Notifier>,
    options: CacheOptions,
}

impl Inner {
    // The store lock is never held across an await, so every write is
    // seen whole. Poisoning cannot leave a half-written entry behind.
    fn store(&self) -> MutexGuard<'_, EntryStore> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn profile(&self) -> UserProfile {
        self.profile
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn account_id(&self) -> String {
        self.profile
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .account_id
            .clone()
    }

    /// Write the outcome of a full fetch, unless a refresh has started a
    /// newer generation in the meantime.
    fn settle_full_fetch(
        &self,
        kind: CollectionKind,
        generation: u64,
        result: Result<Vec<ReferenceItem>, ApiError>,
    ) -> FetchResult {
        let mut store = self.store();
        let current = store.get(kind).generation() == generation;

        match result {
            Ok(items) => {
                let count = items.len();
                if current {
                    info!(collection = %kind, count, "Reference data loaded");
                    Ok(store.set_items(kind, items))
                } else {
                    debug!(collection = %kind, generation, "Superseded fetch finished, result not cached");
                    Ok(Arc::new(items))
                }
            }
            Err(e) => {
                let error = CacheError::transport(kind, e);
                if current {
                    store.set_error(kind, error.clone());
                }
                drop(store);
                self.notifier.fetch_failed(kind, &error);
                Err(error)
            }
        }
    }
}

async fn full_fetch(inner: Arc<Inner>, kind: CollectionKind, generation: u64) -> FetchResult {
    let account_id = inner.account_id();
    info!(collection = %kind, "Fetching reference data");
    let result = fetch_all_pages(
        inner.transport.as_ref(),
        kind,
        &account_id,
        &ParentFilter::default(),
        inner.options.page_size,
        inner.options.max_pages,
    )
    .await;
    inner.settle_full_fetch(kind, generation, result)
}

/// Parent-scoped fetch. The result goes to the caller only; the shared
/// unfiltered entry is left untouched.
async fn scoped_fetch(inner: Arc<Inner>, kind: CollectionKind, parent: ParentFilter) -> FetchResult {
    let account_id = inner.account_id();
    debug!(collection = %kind, parent = ?parent, "Fetching scoped reference data");
    match fetch_all_pages(
        inner.transport.as_ref(),
        kind,
        &account_id,
        &parent,
        inner.options.page_size,
        inner.options.max_pages,
    )
    .await
    {
        Ok(items) => Ok(Arc::new(items)),
        Err(e) => {
            warn!(collection = %kind, parent = ?parent, error = %e, "Scoped fetch failed");
            Err(CacheError::transport(kind, e))
        }
    }
}

enum Lookup {
    Ready(Items),
    Pending(SharedFetch),
}

pub struct ReferenceCacheBuilder {
    transport: Arc<dyn Transport>,
    profile: UserProfile,
    notifier: Arc<dyn Notifier>,
    options: CacheOptions,
}

impl ReferenceCacheBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> ReferenceCache {
        ReferenceCache {
            inner: Arc::new(Inner {
                transport: self.transport,
                store: Mutex::new(EntryStore::new()),
                registry: InFlightRegistry::new(),
                profile: RwLock::new(self.profile),
                notifier: self.notifier,
                options: self.options,
            }),
        }
    }
}

/// Session-scoped cache of Schools, Classes and Divisions.
/// Clone is cheap - all clones share the same store.
#[derive(Clone)]
pub struct ReferenceCache {
    inner: Arc<Inner>,
}

impl ReferenceCache {
    pub fn new(transport: Arc<dyn Transport>, profile: UserProfile) -> Self {
        Self::builder(transport, profile).build()
    }

    pub fn builder(transport: Arc<dyn Transport>, profile: UserProfile) -> ReferenceCacheBuilder {
        ReferenceCacheBuilder {
            transport,
            profile,
            notifier: Arc::new(LogNotifier),
            options: CacheOptions::default(),
        }
    }

    // ===== Fetching =====

    pub async fn get_schools(&self, force_refresh: bool) -> Result<Items, CacheError> {
        self.get_all(CollectionKind::Schools, force_refresh).await
    }

    /// Classes, optionally limited to one school.
    ///
    /// With a school id and a loaded class list the answer is projected
    /// locally. Otherwise a school-scoped request is made that does not
    /// replace the cached full list.
    pub async fn get_classes(
        &self,
        school_id: Option<&ItemId>,
        force_refresh: bool,
    ) -> Result<Items, CacheError> {
        let Some(school_id) = school_id else {
            return self.get_all(CollectionKind::Classes, force_refresh).await;
        };

        if !force_refresh {
            let store = self.inner.store();
            let entry = store.get(CollectionKind::Classes);
            if entry.is_loaded() {
                let classes: Vec<ReferenceItem> =
                    classes_of(entry.items(), Some(school_id), &Scope::Unrestricted)
                        .into_iter()
                        .cloned()
                        .collect();
                return Ok(Arc::new(classes));
            }
        }

        let key = FetchKey::scoped(CollectionKind::Classes, FilterKey::school(school_id));
        let inner = Arc::clone(&self.inner);
        let parent = ParentFilter::school(school_id.clone());
        let fetch = self.inner.registry.fetch_once(key, move || {
            scoped_fetch(inner, CollectionKind::Classes, parent).boxed()
        });
        fetch.await
    }

    /// Divisions. `class_id` does not narrow the list: divisions can be
    /// chosen independently of the selected class.
    pub async fn get_divisions(
        &self,
        class_id: Option<&ItemId>,
        force_refresh: bool,
    ) -> Result<Items, CacheError> {
        if let Some(class_id) = class_id {
            debug!(class = %class_id, "Division lookup ignores class filter");
        }
        self.get_all(CollectionKind::Divisions, force_refresh).await
    }

    async fn get_all(&self, kind: CollectionKind, force_refresh: bool) -> Result<Items, CacheError> {
        match self.lookup_all(kind, force_refresh)? {
            Lookup::Ready(items) => Ok(items),
            Lookup::Pending(fetch) => fetch.await,
        }
    }

    fn lookup_all(&self, kind: CollectionKind, force_refresh: bool) -> Result<Lookup, CacheError> {
        let mut store = self.inner.store();
        let entry = store.get(kind);

        if !force_refresh {
            if entry.is_loaded() {
                debug!(collection = %kind, "Serving reference data from cache");
                return Ok(Lookup::Ready(Arc::clone(entry.items())));
            }

            let retry = self.inner.options.retry;
            let in_flight = self.inner.registry.contains(&FetchKey::all(kind));
            if let (Some(base), false) = (retry.base, in_flight) {
                if let Some(retry_in) = backoff_remaining(entry, base, retry.max, Instant::now()) {
                    if !entry.items().is_empty() {
                        debug!(collection = %kind, "Backing off, serving stale data");
                        return Ok(Lookup::Ready(Arc::clone(entry.items())));
                    }
                    return Err(CacheError::BackingOff { kind, retry_in });
                }
            }
        }

        let generation = entry.generation();
        Ok(Lookup::Pending(self.start_full_fetch(&mut store, kind, generation)))
    }

    fn start_full_fetch(
        &self,
        store: &mut EntryStore,
        kind: CollectionKind,
        generation: u64,
    ) -> SharedFetch {
        let inner = Arc::clone(&self.inner);
        let fetch = self.inner.registry.fetch_once(FetchKey::all(kind), move || {
            full_fetch(inner, kind, generation).boxed()
        });
        store.set_loading(kind, true);
        fetch
    }

    // ===== Invalidation =====

    /// Mark every collection stale and start fresh full fetches in
    /// parallel. The fetches are registered before this returns; awaiting
    /// the returned future is optional.
    pub fn refresh_all(&self) -> BoxFuture<'static, Result<(), CacheError>> {
        info!("Refreshing all reference data");
        let fetches: Vec<SharedFetch> = {
            let mut store = self.inner.store();
            CollectionKind::ALL
                .into_iter()
                .map(|kind| {
                    let generation = store.invalidate(kind);
                    self.inner.registry.forget(&FetchKey::all(kind));
                    self.start_full_fetch(&mut store, kind, generation)
                })
                .collect()
        };

        async move {
            let results = future::join_all(fetches).await;
            match results.into_iter().find_map(Result::err) {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
        .boxed()
    }

    // ===== Name Resolution =====

    pub fn resolve_school_name(&self, id: &ItemId) -> String {
        self.inner.store().resolve_name(CollectionKind::Schools, id)
    }

    pub fn resolve_class_name(&self, id: &ItemId) -> String {
        self.inner.store().resolve_name(CollectionKind::Classes, id)
    }

    pub fn resolve_division_name(&self, id: &ItemId) -> String {
        self.inner.store().resolve_name(CollectionKind::Divisions, id)
    }

    // ===== Inspection =====

    pub fn get_stats(&self) -> CacheStats {
        let store = self.inner.store();
        CacheStats {
            schools: store.get(CollectionKind::Schools).items().len(),
            classes: store.get(CollectionKind::Classes).items().len(),
            divisions: store.get(CollectionKind::Divisions).items().len(),
            ongoing_fetches: self.inner.registry.len(),
        }
    }

    pub fn snapshot(&self, kind: CollectionKind) -> EntrySnapshot {
        self.inner.store().get(kind).snapshot()
    }

    pub fn is_loaded(&self, kind: CollectionKind) -> bool {
        self.inner.store().get(kind).is_loaded()
    }

    /// Cached list without triggering a fetch.
    pub fn cached(&self, kind: CollectionKind) -> Items {
        Arc::clone(self.inner.store().get(kind).items())
    }

    // ===== Session & Scoped Views =====

    pub fn profile(&self) -> UserProfile {
        self.inner.profile()
    }

    /// Replace the session identity. Cached data is kept; scoped views
    /// pick up the new profile on their next call.
    pub fn set_profile(&self, profile: UserProfile) {
        *self
            .inner
            .profile
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = profile;
    }

    pub fn scope(&self) -> Scope {
        Scope::from_profile(&self.inner.profile())
    }

    /// Cached classes visible to the current user for `school_id`.
    pub fn classes_for(&self, school_id: Option<&ItemId>) -> Vec<ReferenceItem> {
        let scope = self.scope();
        let store = self.inner.store();
        classes_of(store.get(CollectionKind::Classes).items(), school_id, &scope)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Cached divisions visible to the current user.
    pub fn divisions_for(
        &self,
        school_id: Option<&ItemId>,
        class_id: Option<&ItemId>,
    ) -> Vec<ReferenceItem> {
        let scope = self.scope();
        let store = self.inner.store();
        divisions_of(store.get(CollectionKind::Divisions).items(), school_id, class_id, &scope)
            .into_iter()
            .cloned()
            .collect()
    }
}
