//! Filter form values and which of its fields are shown.
//!
//! Visibility is a pure function of the caller's role and the current
//! values. Applying it also resets every hidden field, so a value can never
//! narrow a query while its field is invisible.
//!
//! ```text
//! role      staff_type  positions         student_class  class_arm
//! staff     shown       per staff_type    see below      shown iff class set
//! student   reset       reset             shown          shown iff class set
//! other     reset       reset             reset          reset
//! ```
//!
//! With role=staff the class and arm fields name the class whose teacher is
//! wanted. They are shown to a parent caller, and to any caller once a
//! class-teacher position is ticked.
//!
//! Staff-like callers additionally only see the role field once a branch is
//! chosen. Students and parents never see the branch field.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::roles::{StaffType, UserRole};
use crate::types::DbId;

use super::criteria::FilterCriteria;

/// Current values of the filter form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupForm {
    #[serde(default)]
    pub branch: Option<DbId>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub staff_type: Option<StaffType>,
    #[serde(default)]
    pub teaching_positions: BTreeSet<DbId>,
    #[serde(default)]
    pub non_teaching_positions: BTreeSet<DbId>,
    #[serde(default)]
    pub student_class: Option<DbId>,
    #[serde(default)]
    pub class_arm: Option<DbId>,
}

/// Which form fields are displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldVisibility {
    pub branch: bool,
    pub role: bool,
    pub staff_type: bool,
    pub teaching_positions: bool,
    pub non_teaching_positions: bool,
    pub student_class: bool,
    pub class_arm: bool,
}

impl TargetGroupForm {
    /// Compute visibility for `caller_role`, resetting hidden fields.
    ///
    /// `class_teacher_positions` holds the teaching positions that confer
    /// class-teacher responsibility.
    pub fn apply_visibility(
        &mut self,
        caller_role: UserRole,
        class_teacher_positions: &BTreeSet<DbId>,
    ) -> FieldVisibility {
        let mut vis = FieldVisibility::default();

        if caller_role.is_family() {
            self.branch = None;
            vis.role = true;
        } else {
            vis.branch = true;
            vis.role = self.branch.is_some();
            if !vis.role {
                self.role = None;
            }
        }

        match self.role {
            Some(UserRole::Staff) => {
                vis.staff_type = true;
                let staff_type = self.staff_type;
                vis.teaching_positions = staff_type.is_some_and(StaffType::includes_teaching);
                vis.non_teaching_positions =
                    staff_type.is_some_and(StaffType::includes_non_teaching);
            }
            Some(UserRole::Student) => {
                self.staff_type = None;
                vis.student_class = true;
            }
            _ => self.staff_type = None,
        }

        if !vis.teaching_positions {
            self.teaching_positions.clear();
        }
        if !vis.non_teaching_positions {
            self.non_teaching_positions.clear();
        }

        if self.role == Some(UserRole::Staff) {
            vis.student_class = caller_role == UserRole::Parent
                || self
                    .teaching_positions
                    .iter()
                    .any(|id| class_teacher_positions.contains(id));
        }
        if !vis.student_class {
            self.student_class = None;
        }
        vis.class_arm = self.student_class.is_some();
        if !vis.class_arm {
            self.class_arm = None;
        }

        vis
    }

    /// True when nothing relevant to `caller_role` has been chosen.
    ///
    /// Students and parents only count the role; staff-like callers count
    /// everything except the role.
    pub fn is_empty_for(&self, caller_role: UserRole) -> bool {
        if caller_role.is_family() {
            return self.role.is_none();
        }
        self.branch.is_none()
            && self.staff_type.is_none()
            && self.teaching_positions.is_empty()
            && self.non_teaching_positions.is_empty()
            && self.student_class.is_none()
            && self.class_arm.is_none()
    }

    pub fn to_criteria(&self, search: Option<String>) -> FilterCriteria {
        FilterCriteria {
            branch_id: self.branch,
            role: self.role,
            staff_type: self.staff_type,
            teaching_positions: self.teaching_positions.iter().copied().collect(),
            non_teaching_positions: self.non_teaching_positions.iter().copied().collect(),
            student_class_id: self.student_class,
            class_arm_id: self.class_arm,
            search,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASS_TEACHER: DbId = 9;

    fn class_teachers() -> BTreeSet<DbId> {
        [CLASS_TEACHER].into()
    }

    fn staff_form() -> TargetGroupForm {
        TargetGroupForm {
            branch: Some(1),
            role: Some(UserRole::Staff),
            staff_type: Some(StaffType::Teaching),
            teaching_positions: [3].into(),
            non_teaching_positions: [8].into(),
            student_class: Some(2),
            class_arm: Some(5),
        }
    }

    #[test]
    fn staff_role_shows_only_the_selected_bucket() {
        let mut form = staff_form();
        let vis = form.apply_visibility(UserRole::BranchAdmin, &class_teachers());

        assert!(vis.staff_type);
        assert!(vis.teaching_positions);
        assert!(!vis.non_teaching_positions);
        assert!(!vis.student_class);
        assert!(form.non_teaching_positions.is_empty());
        assert_eq!(form.teaching_positions, [3].into());
        assert_eq!(form.student_class, None);
        assert_eq!(form.class_arm, None);
    }

    #[test]
    fn class_teacher_position_keeps_class_and_arm() {
        let mut form = staff_form();
        form.teaching_positions = [3, CLASS_TEACHER].into();
        let vis = form.apply_visibility(UserRole::BranchAdmin, &class_teachers());

        assert!(vis.student_class);
        assert!(vis.class_arm);
        assert_eq!(form.student_class, Some(2));
        assert_eq!(form.class_arm, Some(5));

        form.teaching_positions.remove(&CLASS_TEACHER);
        let vis = form.apply_visibility(UserRole::BranchAdmin, &class_teachers());
        assert!(!vis.student_class);
        assert_eq!(form.student_class, None);
    }

    #[test]
    fn parent_targeting_staff_sees_class_and_arm() {
        let mut form = TargetGroupForm {
            role: Some(UserRole::Staff),
            staff_type: Some(StaffType::Teaching),
            student_class: Some(2),
            ..Default::default()
        };
        let vis = form.apply_visibility(UserRole::Parent, &class_teachers());
        assert!(vis.student_class);
        assert!(vis.class_arm);
        assert_eq!(form.student_class, Some(2));

        // A student caller gets the fields only with a class-teacher position.
        let vis = form.apply_visibility(UserRole::Student, &class_teachers());
        assert!(!vis.student_class);
        assert_eq!(form.student_class, None);
    }

    #[test]
    fn both_shows_both_buckets() {
        let mut form = staff_form();
        form.staff_type = Some(StaffType::Both);
        let vis = form.apply_visibility(UserRole::Superadmin, &class_teachers());
        assert!(vis.teaching_positions && vis.non_teaching_positions);
        assert_eq!(form.non_teaching_positions, [8].into());
    }

    #[test]
    fn student_role_resets_staff_fields() {
        let mut form = staff_form();
        form.role = Some(UserRole::Student);
        let vis = form.apply_visibility(UserRole::Staff, &class_teachers());

        assert!(!vis.staff_type);
        assert!(vis.student_class);
        assert!(vis.class_arm);
        assert_eq!(form.staff_type, None);
        assert!(form.teaching_positions.is_empty());
        assert_eq!(form.student_class, Some(2));
    }

    #[test]
    fn class_arm_hidden_until_class_chosen() {
        let mut form = TargetGroupForm {
            branch: Some(1),
            role: Some(UserRole::Student),
            class_arm: Some(4),
            ..Default::default()
        };
        let vis = form.apply_visibility(UserRole::Staff, &class_teachers());
        assert!(!vis.class_arm);
        assert_eq!(form.class_arm, None);
    }

    #[test]
    fn parent_role_resets_everything_downstream() {
        let mut form = staff_form();
        form.role = Some(UserRole::Parent);
        let vis = form.apply_visibility(UserRole::Student, &class_teachers());

        assert!(vis.role);
        assert!(!vis.branch);
        assert_eq!(form.branch, None);
        assert_eq!(form.staff_type, None);
        assert_eq!(form.student_class, None);
        assert!(form.teaching_positions.is_empty());
    }

    #[test]
    fn clearing_branch_hides_role_for_staff_like() {
        let mut form = staff_form();
        form.branch = None;
        let vis = form.apply_visibility(UserRole::Staff, &class_teachers());

        assert!(vis.branch);
        assert!(!vis.role);
        assert!(!vis.staff_type);
        assert_eq!(form, TargetGroupForm::default());
    }

    #[test]
    fn emptiness_depends_on_caller() {
        let form = TargetGroupForm {
            role: Some(UserRole::Staff),
            ..Default::default()
        };
        assert!(!form.is_empty_for(UserRole::Parent));
        assert!(form.is_empty_for(UserRole::BranchAdmin));
    }
}
