use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::ItemId;

/// Identity services disagree on casing (`teacher`, `Teacher`, `TEACHER`), so
/// deserialization goes through [`Role::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    Admin,
    Staff,
    Teacher,
    #[default]
    Unknown,
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Role::parse(&name)
    }
}

impl Role {
    /// Parse a role name as the identity service spells it. Unknown names
    /// map to `Role::Unknown` rather than failing.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" | "superadmin" => Role::Admin,
            "staff" => Role::Staff,
            "teacher" => Role::Teacher,
            _ => Role::Unknown,
        }
    }
}

/// One class/division pair a teacher is allocated to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    #[serde(alias = "schoolClassId", alias = "class_id")]
    pub class_id: ItemId,
    #[serde(default, alias = "sectionId", alias = "division_id")]
    pub division_id: Option<ItemId>,
}

impl Allocation {
    pub fn new(class_id: impl Into<ItemId>, division_id: impl Into<ItemId>) -> Self {
        Self {
            class_id: class_id.into(),
            division_id: Some(division_id.into()),
        }
    }
}

/// Identity of the current session user as supplied by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub account_id: String,
    #[serde(default)]
    pub role: Role,
    /// Fixed school for teachers; informational for other roles.
    #[serde(default)]
    pub school_id: Option<ItemId>,
    #[serde(default)]
    pub allocated_classes: Vec<Allocation>,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(account_id: impl Into<String>, role: Role) -> Self {
        Self {
            account_id: account_id.into(),
            role,
            school_id: None,
            allocated_classes: Vec::new(),
            token: None,
            created_at: Utc::now(),
        }
    }

    pub fn teacher(
        account_id: impl Into<String>,
        school_id: impl Into<ItemId>,
        allocated_classes: Vec<Allocation>,
    ) -> Self {
        Self {
            school_id: Some(school_id.into()),
            allocated_classes,
            ..Self::new(account_id, Role::Teacher)
        }
    }

    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}
