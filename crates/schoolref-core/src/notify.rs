//! Failure notification sink.
//!
//! The host application usually shows a toast; the default sink only logs.

use tracing::warn;

use crate::cache::CacheError;
use crate::models::CollectionKind;

pub trait Notifier: Send + Sync {
    /// Called once per failed unfiltered fetch, not once per awaiting caller.
    fn fetch_failed(&self, kind: CollectionKind, error: &CacheError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn fetch_failed(&self, kind: CollectionKind, error: &CacheError) {
        warn!(collection = %kind, error = %error, "Failed to load reference data");
    }
}
