use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;
use crate::models::CollectionKind;

/// Errors surfaced by the reference cache.
///
/// `Clone` because every caller that joined a shared fetch receives the
/// same error.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Failed to fetch {kind}: {source}")]
    Transport {
        kind: CollectionKind,
        source: Arc<ApiError>,
    },

    #[error("Fetching {kind} is backing off, retry in {}ms", .retry_in.as_millis())]
    BackingOff {
        kind: CollectionKind,
        retry_in: Duration,
    },
}

impl CacheError {
    pub fn transport(kind: CollectionKind, source: ApiError) -> Self {
        CacheError::Transport {
            kind,
            source: Arc::new(source),
        }
    }

    pub fn kind(&self) -> CollectionKind {
        match self {
            CacheError::Transport { kind, .. } | CacheError::BackingOff { kind, .. } => *kind,
        }
    }
}
