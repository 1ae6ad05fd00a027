//! Filter criteria submitted with a recipient query.
//!
//! Criteria are transient: they are parsed per request from query parameters
//! and never stored except as a [`SavedFilterData`](super::snapshot::SavedFilterData)
//! snapshot on a communication.

use serde::{Deserialize, Serialize};

use crate::roles::{StaffType, UserRole};
use crate::types::DbId;

/// Maximum accepted length of the free-text search term.
pub const MAX_SEARCH_LEN: usize = 100;

/// Roles that may be chosen as a target group.
pub const TARGET_ROLES: &[UserRole] = &[UserRole::Staff, UserRole::Student, UserRole::Parent];

/// Filter values narrowing the set of addressable users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub branch_id: Option<DbId>,
    pub role: Option<UserRole>,
    pub staff_type: Option<StaffType>,
    #[serde(default)]
    pub teaching_positions: Vec<DbId>,
    #[serde(default)]
    pub non_teaching_positions: Vec<DbId>,
    pub student_class_id: Option<DbId>,
    pub class_arm_id: Option<DbId>,
    pub search: Option<String>,
}

/// A filter value that is present but not acceptable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriteriaError {
    #[error("'{value}' is not a valid {field}")]
    InvalidValue { field: &'static str, value: String },

    #[error("'{0}' cannot be chosen as a target group")]
    RoleNotTargetable(String),

    #[error("search must be at most {MAX_SEARCH_LEN} characters")]
    SearchTooLong,
}

impl FilterCriteria {
    /// Build criteria from raw `(name, value)` query pairs.
    ///
    /// Empty values are treated as absent. Position lists accept either
    /// repeated keys (`teaching_positions=1&teaching_positions=2`, with or
    /// without a `[]` suffix) or comma-separated values; non-numeric position
    /// entries are dropped. Scalar fields with an unparseable value are an
    /// error. Unknown keys are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, CriteriaError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut criteria = FilterCriteria::default();

        for (name, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match name.trim_end_matches("[]") {
                "branch" => criteria.branch_id = Some(parse_id("branch", value)?),
                "role" => criteria.role = Some(parse_target_role(value)?),
                "staff_type" => {
                    criteria.staff_type =
                        Some(StaffType::parse(value).ok_or_else(|| CriteriaError::InvalidValue {
                            field: "staff_type",
                            value: value.to_string(),
                        })?)
                }
                "teaching_positions" => criteria.teaching_positions.extend(clean_id_list(value)),
                "non_teaching_positions" => {
                    criteria.non_teaching_positions.extend(clean_id_list(value))
                }
                "student_class" => {
                    criteria.student_class_id = Some(parse_id("student_class", value)?)
                }
                "class_arm" => criteria.class_arm_id = Some(parse_id("class_arm", value)?),
                "search" => {
                    if value.chars().count() > MAX_SEARCH_LEN {
                        return Err(CriteriaError::SearchTooLong);
                    }
                    criteria.search = Some(value.to_string());
                }
                _ => {}
            }
        }

        Ok(criteria.normalized())
    }

    /// Sort and deduplicate the position lists.
    pub fn normalized(mut self) -> Self {
        self.teaching_positions.sort_unstable();
        self.teaching_positions.dedup();
        self.non_teaching_positions.sort_unstable();
        self.non_teaching_positions.dedup();
        self
    }

    /// Both halves of the class/arm pair, when supplied together.
    pub fn class_slot(&self) -> Option<ClassSlot> {
        match (self.student_class_id, self.class_arm_id) {
            (Some(student_class_id), Some(class_arm_id)) => Some(ClassSlot {
                student_class_id,
                class_arm_id,
            }),
            _ => None,
        }
    }
}

/// A (class, arm) pair: where a student sits, or what a class teacher manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassSlot {
    pub student_class_id: DbId,
    pub class_arm_id: DbId,
}

fn parse_id(field: &'static str, value: &str) -> Result<DbId, CriteriaError> {
    value.parse().map_err(|_| CriteriaError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn parse_target_role(value: &str) -> Result<UserRole, CriteriaError> {
    let role = UserRole::parse(value).ok_or_else(|| CriteriaError::InvalidValue {
        field: "role",
        value: value.to_string(),
    })?;
    if !TARGET_ROLES.contains(&role) {
        return Err(CriteriaError::RoleNotTargetable(value.to_string()));
    }
    Ok(role)
}

/// Parse a comma-separated id list, silently dropping non-numeric entries.
pub fn clean_id_list(raw: &str) -> Vec<DbId> {
    raw.split(',')
        .filter_map(|item| item.trim().parse::<DbId>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_repeated_and_bracketed_positions() {
        let criteria = FilterCriteria::from_pairs([
            ("branch", "4"),
            ("role", "staff"),
            ("staff_type", "both"),
            ("teaching_positions[]", "7"),
            ("teaching_positions", "3"),
            ("non_teaching_positions", "9,x,9"),
        ])
        .unwrap();

        assert_eq!(criteria.branch_id, Some(4));
        assert_eq!(criteria.role, Some(UserRole::Staff));
        assert_eq!(criteria.staff_type, Some(StaffType::Both));
        assert_eq!(criteria.teaching_positions, vec![3, 7]);
        assert_eq!(criteria.non_teaching_positions, vec![9]);
    }

    #[test]
    fn empty_values_are_absent() {
        let criteria =
            FilterCriteria::from_pairs([("branch", ""), ("role", "  "), ("search", "")]).unwrap();
        assert_eq!(criteria, FilterCriteria::default());
    }

    #[test]
    fn rejects_untargetable_role() {
        let err = FilterCriteria::from_pairs([("role", "superadmin")]).unwrap_err();
        assert_matches!(err, CriteriaError::RoleNotTargetable(_));
    }

    #[test]
    fn rejects_non_numeric_branch() {
        let err = FilterCriteria::from_pairs([("branch", "north")]).unwrap_err();
        assert_matches!(err, CriteriaError::InvalidValue { field: "branch", .. });
    }

    #[test]
    fn class_slot_needs_both_halves() {
        let mut criteria = FilterCriteria {
            student_class_id: Some(1),
            ..Default::default()
        };
        assert_eq!(criteria.class_slot(), None);
        criteria.class_arm_id = Some(2);
        assert_eq!(
            criteria.class_slot(),
            Some(ClassSlot {
                student_class_id: 1,
                class_arm_id: 2
            })
        );
    }
}
