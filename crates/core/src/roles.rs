//! Well-known role and staff-type names.
//!
//! These must match the `CHECK` constraints in `20260301000001_create_directory.sql`.

use serde::{Deserialize, Serialize};

pub const ROLE_SUPERADMIN: &str = "superadmin";
pub const ROLE_BRANCH_ADMIN: &str = "branch_admin";
pub const ROLE_STAFF: &str = "staff";
pub const ROLE_STUDENT: &str = "student";
pub const ROLE_PARENT: &str = "parent";

pub const STAFF_TYPE_TEACHING: &str = "teaching";
pub const STAFF_TYPE_NON_TEACHING: &str = "non_teaching";
pub const STAFF_TYPE_BOTH: &str = "both";

/// Role of a directory user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Superadmin,
    BranchAdmin,
    Staff,
    Student,
    Parent,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Superadmin => ROLE_SUPERADMIN,
            UserRole::BranchAdmin => ROLE_BRANCH_ADMIN,
            UserRole::Staff => ROLE_STAFF,
            UserRole::Student => ROLE_STUDENT,
            UserRole::Parent => ROLE_PARENT,
        }
    }

    /// Parse a stored role name. Unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            ROLE_SUPERADMIN => Some(UserRole::Superadmin),
            ROLE_BRANCH_ADMIN => Some(UserRole::BranchAdmin),
            ROLE_STAFF => Some(UserRole::Staff),
            ROLE_STUDENT => Some(UserRole::Student),
            ROLE_PARENT => Some(UserRole::Parent),
            _ => None,
        }
    }

    /// Staff, branch admins, and superadmins compose messages by branch.
    pub fn is_staff_like(self) -> bool {
        matches!(
            self,
            UserRole::Superadmin | UserRole::BranchAdmin | UserRole::Staff
        )
    }

    /// Students and parents have an implied branch and pick a target role.
    pub fn is_family(self) -> bool {
        matches!(self, UserRole::Student | UserRole::Parent)
    }

    /// Roles whose own branch confines what they can see.
    ///
    /// Only a superadmin may address users across branches.
    pub fn is_branch_isolated(self) -> bool {
        !matches!(self, UserRole::Superadmin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position category of a staff member, and the bucket selector of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffType {
    Teaching,
    NonTeaching,
    Both,
}

impl StaffType {
    pub fn as_str(self) -> &'static str {
        match self {
            StaffType::Teaching => STAFF_TYPE_TEACHING,
            StaffType::NonTeaching => STAFF_TYPE_NON_TEACHING,
            StaffType::Both => STAFF_TYPE_BOTH,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            STAFF_TYPE_TEACHING => Some(StaffType::Teaching),
            STAFF_TYPE_NON_TEACHING => Some(StaffType::NonTeaching),
            STAFF_TYPE_BOTH => Some(StaffType::Both),
            _ => None,
        }
    }

    pub fn includes_teaching(self) -> bool {
        matches!(self, StaffType::Teaching | StaffType::Both)
    }

    pub fn includes_non_teaching(self) -> bool {
        matches!(self, StaffType::NonTeaching | StaffType::Both)
    }
}

impl std::fmt::Display for StaffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
