//! Dependent school/class/division selection.
//!
//! Rules:
//! - changing the school clears class and division
//! - changing the class leaves the division alone
//! - pinning a teacher's school clears class and division like a manual change

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Scope;
use crate::models::ItemId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub school_id: Option<ItemId>,
    pub class_id: Option<ItemId>,
    pub division_id: Option<ItemId>,
}

fn same(a: Option<&ItemId>, b: Option<&ItemId>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_as(b),
        (None, None) => true,
        _ => false,
    }
}

impl Selection {
    pub fn new(
        school_id: Option<ItemId>,
        class_id: Option<ItemId>,
        division_id: Option<ItemId>,
    ) -> Self {
        Self {
            school_id,
            class_id,
            division_id,
        }
    }

    /// Returns true when the school actually changed.
    pub fn set_school(&mut self, school_id: Option<ItemId>) -> bool {
        if same(self.school_id.as_ref(), school_id.as_ref()) {
            return false;
        }
        self.school_id = school_id;
        self.class_id = None;
        self.division_id = None;
        true
    }

    pub fn set_class(&mut self, class_id: Option<ItemId>) {
        self.class_id = class_id;
    }

    pub fn set_division(&mut self, division_id: Option<ItemId>) {
        self.division_id = division_id;
    }

    /// Force the teacher's fixed school onto the selection. Returns true
    /// when a correction was made.
    pub fn enforce_scope(&mut self, scope: &Scope) -> bool {
        let Some(fixed) = scope.fixed_school() else {
            return false;
        };
        let corrected = self.set_school(Some(fixed.clone()));
        if corrected {
            debug!(school = %fixed, "Selection corrected to teacher school");
        }
        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    fn selection(school: i64, class: i64, division: i64) -> Selection {
        Selection::new(
            Some(ItemId::Int(school)),
            Some(ItemId::Int(class)),
            Some(ItemId::Int(division)),
        )
    }

    #[test]
    fn test_school_change_clears_dependents() {
        let mut s = selection(1, 2, 3);
        assert!(s.set_school(Some(ItemId::Int(2))));
        assert_eq!(s, Selection::new(Some(ItemId::Int(2)), None, None));
    }

    #[test]
    fn test_class_change_keeps_division() {
        let mut s = selection(2, 2, 3);
        s.set_class(Some(ItemId::Int(5)));
        assert_eq!(s, selection(2, 5, 3));
    }

    #[test]
    fn test_same_school_is_not_a_change() {
        let mut s = selection(1, 2, 3);
        assert!(!s.set_school(Some(ItemId::from("1"))));
        assert_eq!(s, selection(1, 2, 3));
    }

    #[test]
    fn test_enforce_teacher_school() {
        let scope = Scope::from_profile(&UserProfile::teacher("acc", 7, Vec::new()));

        let mut wrong = selection(1, 2, 3);
        assert!(wrong.enforce_scope(&scope));
        assert_eq!(wrong, Selection::new(Some(ItemId::Int(7)), None, None));

        let mut right = selection(7, 2, 3);
        assert!(!right.enforce_scope(&scope));
        assert_eq!(right, selection(7, 2, 3));

        let mut any = selection(1, 2, 3);
        assert!(!any.enforce_scope(&Scope::Unrestricted));
    }
}
