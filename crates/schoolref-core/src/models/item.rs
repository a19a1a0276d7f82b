use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::aliases::{self, ParentKey};

/// Label returned when an id has no cached name.
pub const NAME_NOT_FOUND: &str = "N/A";

/// The three reference collections held by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Schools,
    Classes,
    Divisions,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::Schools,
        CollectionKind::Classes,
        CollectionKind::Divisions,
    ];

    /// Path segment used by the list endpoints.
    pub fn path_segment(&self) -> &'static str {
        match self {
            CollectionKind::Schools => "schools",
            CollectionKind::Classes => "classes",
            CollectionKind::Divisions => "divisions",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            CollectionKind::Schools => 0,
            CollectionKind::Classes => 1,
            CollectionKind::Divisions => 2,
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Opaque identifier. Endpoints disagree on whether ids are numbers or
/// strings, so comparisons go through the string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Str(String),
}

impl ItemId {
    /// Coerce a JSON scalar into an id. Empty strings and non-scalars are not ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Some(ItemId::Int(i)),
                // `7.0` names the same row as `7`.
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(ItemId::Int(f as i64)),
                _ => Some(ItemId::Str(n.to_string())),
            },
            Value::String(s) if !s.trim().is_empty() => Some(ItemId::Str(s.trim().to_string())),
            _ => None,
        }
    }

    /// String-coerced equality: `ItemId::Int(5)` is the same as `ItemId::Str("5")`.
    pub fn same_as(&self, other: &ItemId) -> bool {
        match (self, other) {
            (ItemId::Int(a), ItemId::Int(b)) => a == b,
            (ItemId::Str(a), ItemId::Str(b)) => a == b,
            _ => self.key() == other.key(),
        }
    }

    /// Canonical string form used for lookups and registry keys.
    pub fn key(&self) -> String {
        match self {
            ItemId::Int(i) => i.to_string(),
            ItemId::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(i) => write!(f, "{}", i),
            ItemId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        ItemId::Int(value)
    }
}

impl From<i32> for ItemId {
    fn from(value: i32) -> Self {
        ItemId::Int(i64::from(value))
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        ItemId::Str(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        ItemId::Str(value)
    }
}

/// One School, Class or Division row with its hierarchy keys normalized.
///
/// The raw row is kept in `attributes` so forms can still read fields the
/// cache does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub id: ItemId,
    pub name: String,
    pub school_id: Option<ItemId>,
    pub class_id: Option<ItemId>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ReferenceItem {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            school_id: None,
            class_id: None,
            attributes: Map::new(),
        }
    }

    pub fn with_school(mut self, school_id: impl Into<ItemId>) -> Self {
        self.school_id = Some(school_id.into());
        self
    }

    pub fn with_class(mut self, class_id: impl Into<ItemId>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }

    /// Build an item of collection `kind` from one element of a page's
    /// `content` array. Returns `None` for rows that are not objects or carry no id.
    pub fn from_raw(kind: CollectionKind, raw: &Value) -> Option<Self> {
        let object = raw.as_object()?;
        let id = aliases::resolve_id(object)?;
        let name = aliases::resolve_name(object, kind).unwrap_or_default();

        Some(Self {
            id,
            name,
            school_id: aliases::resolve_parent_key(object, ParentKey::School),
            class_id: aliases::resolve_parent_key(object, ParentKey::Class),
            attributes: object.clone(),
        })
    }

    /// Convert a page of raw rows, skipping malformed ones.
    pub fn from_page(kind: CollectionKind, rows: &[Value]) -> Vec<Self> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match Self::from_raw(kind, row) {
                Some(item) => items.push(item),
                None => warn!(collection = %kind, "Skipping row without a usable id"),
            }
        }
        items
    }

    /// Normalized school key, falling back to nothing.
    pub fn school_key(&self) -> Option<&ItemId> {
        self.school_id.as_ref()
    }

    /// Normalized class key.
    pub fn class_key(&self) -> Option<&ItemId> {
        self.class_id.as_ref()
    }
}
