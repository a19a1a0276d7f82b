//! Field-name alias table.
//!
//! Endpoints name the same foreign key in several ways (`schoolId`,
//! `schoolBranchId`, `branchId`, ...). Every lookup goes through the tables
//! below in declaration order; the first alias present with a usable value
//! wins. Dotted aliases descend into nested objects.

use serde_json::{Map, Value};

use super::item::{CollectionKind, ItemId};

const ID_ALIASES: &[&str] = &["id", "_id"];

const SCHOOL_NAME_ALIASES: &[&str] = &["name", "schoolName", "branchName"];

const CLASS_NAME_ALIASES: &[&str] = &["name", "className"];

const DIVISION_NAME_ALIASES: &[&str] = &["name", "divisionName", "sectionName"];

const SCHOOL_ALIASES: &[&str] = &[
    "schoolId",
    "schoolBranchId",
    "branchId",
    "school_id",
    "school.id",
    "branch.id",
];

const CLASS_ALIASES: &[&str] = &["classId", "schoolClassId", "class_id", "class.id"];

const DIVISION_ALIASES: &[&str] = &["divisionId", "sectionId", "division_id", "division.id"];

/// Which logical foreign key to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKey {
    School,
    Class,
    Division,
}

impl ParentKey {
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ParentKey::School => SCHOOL_ALIASES,
            ParentKey::Class => CLASS_ALIASES,
            ParentKey::Division => DIVISION_ALIASES,
        }
    }
}

fn lookup<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn first_id(object: &Map<String, Value>, aliases: &[&str]) -> Option<ItemId> {
    aliases
        .iter()
        .find_map(|alias| lookup(object, alias).and_then(ItemId::from_value))
}

/// Resolve a logical foreign key from a raw row.
pub fn resolve_parent_key(object: &Map<String, Value>, key: ParentKey) -> Option<ItemId> {
    first_id(object, key.aliases())
}

pub(crate) fn resolve_id(object: &Map<String, Value>) -> Option<ItemId> {
    first_id(object, ID_ALIASES)
}

/// Display label for a row. Joined rows carry their parents' names too, so
/// only the aliases belonging to `kind` are consulted.
pub(crate) fn resolve_name(object: &Map<String, Value>, kind: CollectionKind) -> Option<String> {
    let aliases = match kind {
        CollectionKind::Schools => SCHOOL_NAME_ALIASES,
        CollectionKind::Classes => CLASS_NAME_ALIASES,
        CollectionKind::Divisions => DIVISION_NAME_ALIASES,
    };
    aliases.iter().find_map(|alias| match lookup(object, alias)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
