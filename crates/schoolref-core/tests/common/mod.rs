//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use schoolref_core::api::{PageEnvelope, PageRequest};
use schoolref_core::{ApiError, CacheError, CollectionKind, Notifier, Transport};
use serde_json::Value;

/// Returns canned rows per collection after a fixed latency and counts
/// every request.
pub struct ScriptedTransport {
    rows: Mutex<HashMap<CollectionKind, Vec<Value>>>,
    failing: Mutex<Vec<CollectionKind>>,
    calls: Mutex<HashMap<CollectionKind, usize>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            latency,
        })
    }

    pub fn set_rows(&self, kind: CollectionKind, rows: Vec<Value>) {
        self.rows.lock().unwrap().insert(kind, rows);
    }

    pub fn fail(&self, kind: CollectionKind) {
        self.failing.lock().unwrap().push(kind);
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self, kind: CollectionKind) -> usize {
        self.calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch_page(
        &self,
        kind: CollectionKind,
        _account_id: &str,
        _request: &PageRequest,
    ) -> Result<PageEnvelope, ApiError> {
        *self.calls.lock().unwrap().entry(kind).or_insert(0) += 1;
        tokio::time::sleep(self.latency).await;
        if self.failing.lock().unwrap().contains(&kind) {
            return Err(ApiError::ServerError("unavailable".to_string()));
        }
        let rows = self.rows.lock().unwrap().get(&kind).cloned().unwrap_or_default();
        Ok(PageEnvelope::from_rows(rows))
    }
}

/// Counts failure notifications.
#[derive(Default)]
pub struct CountingNotifier {
    pub failures: AtomicUsize,
}

impl Notifier for CountingNotifier {
    fn fetch_failed(&self, _kind: CollectionKind, _error: &CacheError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

impl CountingNotifier {
    pub fn count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}
