use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;
use crate::models::{CollectionKind, ItemId, ReferenceItem};

/// Parent scope attached to a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentFilter {
    pub school_id: Option<ItemId>,
}

impl ParentFilter {
    pub fn school(school_id: ItemId) -> Self {
        Self {
            school_id: Some(school_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.school_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub parent: ParentFilter,
}

/// One page of a list response.
///
/// `content` is kept as a raw value: a missing or non-array `content` is a
/// shape problem and reads as an empty page rather than an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub last: Option<bool>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

impl PageEnvelope {
    pub fn from_rows(rows: Vec<Value>) -> Self {
        Self {
            content: Some(Value::Array(rows)),
            last: Some(true),
            total_pages: Some(1),
        }
    }

    /// Interpret an arbitrary response body. Bare arrays are accepted as a
    /// single final page; anything else without `content` is an empty page.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(rows) => Self::from_rows(rows),
            other => serde_json::from_value(other).unwrap_or_default(),
        }
    }

    pub fn rows(&self) -> &[Value] {
        match &self.content {
            Some(Value::Array(rows)) => rows,
            _ => &[],
        }
    }
}

/// Issues one paged list request for a collection, scoped to an account.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_page(
        &self,
        kind: CollectionKind,
        account_id: &str,
        request: &PageRequest,
    ) -> Result<PageEnvelope, ApiError>;
}

/// Walk pages until the server reports the last one, a short page arrives,
/// or `max_pages` is reached.
pub async fn fetch_all_pages(
    transport: &dyn Transport,
    kind: CollectionKind,
    account_id: &str,
    parent: &ParentFilter,
    page_size: u32,
    max_pages: u32,
) -> Result<Vec<ReferenceItem>, ApiError> {
    let size = page_size.max(1);
    let mut items = Vec::new();
    let mut page = 0;

    loop {
        let request = PageRequest {
            page,
            size,
            parent: parent.clone(),
        };
        let envelope = transport.fetch_page(kind, account_id, &request).await?;
        let rows = envelope.rows();
        if envelope.content.is_none() {
            debug!(collection = %kind, page, "Page without content, treating as empty");
        }
        items.extend(ReferenceItem::from_page(kind, rows));

        let reached_total = envelope.total_pages.is_some_and(|total| page + 1 >= total);
        if envelope.last.unwrap_or(false) || reached_total || (rows.len() as u32) < size {
            break;
        }
        page += 1;
        if page >= max_pages {
            warn!(collection = %kind, max_pages, "Page limit reached, list may be incomplete");
            break;
        }
    }

    Ok(items)
}
