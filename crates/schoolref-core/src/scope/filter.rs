use std::collections::HashSet;

use crate::models::{ItemId, ReferenceItem, UserProfile};

/// Allocation-derived restriction for a teacher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeacherScope {
    pub school_id: Option<ItemId>,
    class_ids: HashSet<String>,
    division_ids: HashSet<String>,
    has_allocations: bool,
}

impl TeacherScope {
    pub fn allows_class(&self, id: &ItemId) -> bool {
        self.class_ids.contains(&id.key())
    }

    pub fn allows_division(&self, id: &ItemId) -> bool {
        self.division_ids.contains(&id.key())
    }

    pub fn has_allocations(&self) -> bool {
        self.has_allocations
    }
}

/// Who is looking at the reference data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    Unrestricted,
    Teacher(TeacherScope),
}

impl Scope {
    pub fn from_profile(profile: &UserProfile) -> Self {
        if !profile.is_teacher() {
            return Scope::Unrestricted;
        }
        let allocations = &profile.allocated_classes;
        Scope::Teacher(TeacherScope {
            school_id: profile.school_id.clone(),
            class_ids: allocations.iter().map(|a| a.class_id.key()).collect(),
            division_ids: allocations
                .iter()
                .filter_map(|a| a.division_id.as_ref().map(ItemId::key))
                .collect(),
            has_allocations: !allocations.is_empty(),
        })
    }

    /// School the user is pinned to, if any.
    pub fn fixed_school(&self) -> Option<&ItemId> {
        match self {
            Scope::Teacher(teacher) => teacher.school_id.as_ref(),
            Scope::Unrestricted => None,
        }
    }

    fn allocated(&self) -> Option<&TeacherScope> {
        match self {
            Scope::Teacher(teacher) if teacher.has_allocations => Some(teacher),
            _ => None,
        }
    }
}

fn matches_school(key: Option<&ItemId>, school_id: &ItemId) -> bool {
    key.is_some_and(|key| key.same_as(school_id))
}

/// Classes visible for `school_id`, in cache order.
///
/// A teacher with allocations sees exactly the allocated classes. Otherwise
/// classes are filtered by school key; a teacher's own school overrides the
/// requested one.
pub fn classes_of<'a>(
    classes: &'a [ReferenceItem],
    school_id: Option<&ItemId>,
    scope: &Scope,
) -> Vec<&'a ReferenceItem> {
    if let Some(teacher) = scope.allocated() {
        return classes.iter().filter(|c| teacher.allows_class(&c.id)).collect();
    }

    match scope.fixed_school().or(school_id) {
        Some(school_id) => classes
            .iter()
            .filter(|c| matches_school(c.school_key(), school_id))
            .collect(),
        None => classes.iter().collect(),
    }
}

/// Divisions visible for a school/class pair, in cache order.
///
/// Divisions are not narrowed by `class_id`: a division can be picked
/// independently of the selected class. Divisions without a school key are
/// global and pass the school filter.
pub fn divisions_of<'a>(
    divisions: &'a [ReferenceItem],
    school_id: Option<&ItemId>,
    _class_id: Option<&ItemId>,
    scope: &Scope,
) -> Vec<&'a ReferenceItem> {
    if let Some(teacher) = scope.allocated() {
        return divisions.iter().filter(|d| teacher.allows_division(&d.id)).collect();
    }

    match scope.fixed_school().or(school_id) {
        Some(school_id) => divisions
            .iter()
            .filter(|d| d.school_key().map_or(true, |key| key.same_as(school_id)))
            .collect(),
        None => divisions.iter().collect(),
    }
}
