//! Frozen filter snapshot stored on a communication.
//!
//! The snapshot is written from the `saved_*` hidden fields of a submission
//! and read back when a draft is reopened, so the same candidate list can be
//! rebuilt for further editing.

use serde::{Deserialize, Serialize};

use crate::roles::{StaffType, UserRole};
use crate::types::DbId;

use super::criteria::{clean_id_list, FilterCriteria};

/// Persisted shape of the filter form, keyed the way the form fields are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFilterData {
    #[serde(rename = "id_branch", default)]
    pub branch_id: Option<DbId>,
    #[serde(rename = "id_role", default)]
    pub role: Option<UserRole>,
    #[serde(rename = "id_staff_type", default)]
    pub staff_type: Option<StaffType>,
    #[serde(rename = "id_student_class", default)]
    pub student_class_id: Option<DbId>,
    #[serde(rename = "id_class_arm", default)]
    pub class_arm_id: Option<DbId>,
    #[serde(rename = "id_teaching_positions", default)]
    pub teaching_positions: Vec<DbId>,
    #[serde(rename = "id_non_teaching_positions", default)]
    pub non_teaching_positions: Vec<DbId>,
}

/// The raw `saved_*` fields as they arrive in a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFilterFields {
    #[serde(default)]
    pub saved_branch: String,
    #[serde(default)]
    pub saved_role: String,
    #[serde(default)]
    pub saved_staff_type: String,
    #[serde(default)]
    pub saved_student_class: String,
    #[serde(default)]
    pub saved_class_arm: String,
    #[serde(default)]
    pub saved_teaching_positions: String,
    #[serde(default)]
    pub saved_non_teaching_positions: String,
}

impl SavedFilterFields {
    /// Assign a multipart field by name. Returns `false` for unrelated names.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "saved_branch" => &mut self.saved_branch,
            "saved_role" => &mut self.saved_role,
            "saved_staff_type" => &mut self.saved_staff_type,
            "saved_student_class" => &mut self.saved_student_class,
            "saved_class_arm" => &mut self.saved_class_arm,
            "saved_teaching_positions" => &mut self.saved_teaching_positions,
            "saved_non_teaching_positions" => &mut self.saved_non_teaching_positions,
            _ => return false,
        };
        *slot = value;
        true
    }
}

impl SavedFilterData {
    /// Freeze submitted fields into a snapshot.
    ///
    /// Unparseable scalar values are dropped rather than rejected; the
    /// snapshot only has to be good enough to rebuild the form. For student
    /// and parent callers the branch is always their own.
    pub fn from_fields(
        fields: &SavedFilterFields,
        caller_role: UserRole,
        caller_branch: Option<DbId>,
    ) -> Self {
        let branch_id = if caller_role.is_family() {
            caller_branch
        } else {
            parse_opt(&fields.saved_branch)
        };

        let mut teaching_positions = clean_id_list(&fields.saved_teaching_positions);
        teaching_positions.sort_unstable();
        teaching_positions.dedup();
        let mut non_teaching_positions = clean_id_list(&fields.saved_non_teaching_positions);
        non_teaching_positions.sort_unstable();
        non_teaching_positions.dedup();

        Self {
            branch_id,
            role: UserRole::parse(fields.saved_role.trim()),
            staff_type: StaffType::parse(fields.saved_staff_type.trim()),
            student_class_id: parse_opt(&fields.saved_student_class),
            class_arm_id: parse_opt(&fields.saved_class_arm),
            teaching_positions,
            non_teaching_positions,
        }
    }

    /// Snapshot of criteria that were resolved directly.
    pub fn from_criteria(criteria: &FilterCriteria) -> Self {
        Self {
            branch_id: criteria.branch_id,
            role: criteria.role,
            staff_type: criteria.staff_type,
            student_class_id: criteria.student_class_id,
            class_arm_id: criteria.class_arm_id,
            teaching_positions: criteria.teaching_positions.clone(),
            non_teaching_positions: criteria.non_teaching_positions.clone(),
        }
    }

    /// Criteria that re-run the snapshot. Search is never part of it.
    pub fn to_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            branch_id: self.branch_id,
            role: self.role,
            staff_type: self.staff_type,
            teaching_positions: self.teaching_positions.clone(),
            non_teaching_positions: self.non_teaching_positions.clone(),
            student_class_id: self.student_class_id,
            class_arm_id: self.class_arm_id,
            search: None,
        }
        .normalized()
    }

    /// The `saved_*` field values this snapshot would be resubmitted as.
    pub fn to_fields(&self) -> SavedFilterFields {
        fn opt(v: Option<DbId>) -> String {
            v.map(|v| v.to_string()).unwrap_or_default()
        }
        fn list(ids: &[DbId]) -> String {
            ids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        }
        SavedFilterFields {
            saved_branch: opt(self.branch_id),
            saved_role: self.role.map(|r| r.as_str().to_string()).unwrap_or_default(),
            saved_staff_type: self
                .staff_type
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            saved_student_class: opt(self.student_class_id),
            saved_class_arm: opt(self.class_arm_id),
            saved_teaching_positions: list(&self.teaching_positions),
            saved_non_teaching_positions: list(&self.non_teaching_positions),
        }
    }
}

fn parse_opt(raw: &str) -> Option<DbId> {
    raw.trim().parse().ok()
}
