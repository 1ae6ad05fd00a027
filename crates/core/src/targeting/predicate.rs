//! Recipient resolution.
//!
//! [`resolve`] turns a caller and a set of [`FilterCriteria`] into a
//! [`RecipientPredicate`]: either an explicit reason why nothing may be
//! addressed, or a [`Selection`] describing exactly which directory users
//! match. The predicate is data, not a query; `lagooz-db` compiles it to SQL
//! and [`Selection::matches`] evaluates it in memory.
//!
//! Each caller role has its own resolver function. All of them share
//! [`staff_filter`] for targeting staff by position.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::roles::{StaffType, UserRole};
use crate::types::DbId;

use super::criteria::{ClassSlot, FilterCriteria};

/// Roles a student or parent may reach through the staff filter.
pub const FAMILY_STAFF_SCOPE: &[UserRole] = &[UserRole::Staff, UserRole::BranchAdmin];

/// Roles a staff-like caller may reach through the staff filter.
pub const STAFF_LIKE_STAFF_SCOPE: &[UserRole] =
    &[UserRole::Staff, UserRole::BranchAdmin, UserRole::Superadmin];

// ---------------------------------------------------------------------------
// Caller
// ---------------------------------------------------------------------------

/// What the engine needs to know about the user making the request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallerContext {
    pub user_id: DbId,
    pub role: Option<UserRole>,
    pub branch_id: Option<DbId>,
    /// Parent accounts linked to a student caller.
    pub linked_parent_ids: Vec<DbId>,
    /// Class placements of a parent caller's children.
    pub child_placements: Vec<ClassSlot>,
}

impl CallerContext {
    pub fn new(user_id: DbId, role: UserRole, branch_id: Option<DbId>) -> Self {
        Self {
            user_id,
            role: Some(role),
            branch_id,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// Why a resolution produced no recipients.
///
/// None of these are errors. They carry the text shown in place of the
/// candidate table so the user knows which filter to refine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    FiltersEmpty,
    BranchRequired,
    RoleRequired,
    StudentClassRequired,
    StaffTypeRequired,
    PositionsRequired(StaffType),
    ClassArmPairRequired,
    ClassTeacherRequired,
    ParentUnresolvable,
    NotPermitted,
    OutsideBranch,
}

impl EmptyReason {
    pub fn message(self) -> &'static str {
        match self {
            EmptyReason::FiltersEmpty => "Select filters to load recipients.",
            EmptyReason::BranchRequired => "Please select a branch.",
            EmptyReason::RoleRequired => "Please select a role.",
            EmptyReason::StudentClassRequired => "Please select class and arm to view students.",
            EmptyReason::StaffTypeRequired => "Please select a staff type.",
            EmptyReason::PositionsRequired(StaffType::Teaching) => {
                "Please select at least one Teaching position."
            }
            EmptyReason::PositionsRequired(StaffType::NonTeaching) => {
                "Please select at least one Non-Teaching position."
            }
            EmptyReason::PositionsRequired(StaffType::Both) => {
                "Please select at least one Teaching or Non-Teaching position."
            }
            EmptyReason::ClassArmPairRequired => {
                "Please select class and arm to find the class teacher."
            }
            EmptyReason::ClassTeacherRequired => "Please select a class teacher position.",
            EmptyReason::ParentUnresolvable => "No linked parent account found.",
            EmptyReason::NotPermitted => "You cannot message this group.",
            EmptyReason::OutsideBranch => "No users found.",
        }
    }
}

/// Outcome of resolving criteria for a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientPredicate {
    Nothing(EmptyReason),
    Match(Selection),
}

/// A conjunction of conditions on directory users.
///
/// Inactive users and the caller are always excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub exclude_user_id: DbId,
    pub branch_id: Option<DbId>,
    pub audience: Audience,
    /// Case-insensitive substring of first name, last name, or email.
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every role.
    Anyone,
    /// A plain role filter.
    Role(UserRole),
    /// Students, optionally narrowed to a class and arm.
    Students {
        student_class_id: Option<DbId>,
        class_arm_id: Option<DbId>,
    },
    /// Exactly these users.
    Users(Vec<DbId>),
    Staff(StaffFilter),
}

/// Staff matched by position.
///
/// A user matches when their role is in `role_scope` and they hold one of
/// the listed teaching positions or one of the listed non-teaching positions,
/// directly or through an assignment record. An empty list means that bucket
/// was not requested. When `managing` is set, only users with an assignment
/// record managing that exact class and arm match.
///
/// Users with role `staff` must also carry one of `staff_types`; an empty
/// list accepts any. Admin roles have no staff type and are not narrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffFilter {
    pub role_scope: Vec<UserRole>,
    pub staff_types: Vec<StaffType>,
    pub teaching_positions: Vec<DbId>,
    pub non_teaching_positions: Vec<DbId>,
    pub managing: Option<ClassSlot>,
}

// ---------------------------------------------------------------------------
// Resolvers
// ---------------------------------------------------------------------------

/// Resolve `criteria` for `caller`.
///
/// `class_teacher_positions` holds the ids of teaching positions flagged as
/// conferring class-teacher responsibility. Only its intersection with the
/// submitted positions matters, so callers may pass just that.
pub fn resolve(
    caller: &CallerContext,
    criteria: &FilterCriteria,
    class_teacher_positions: &BTreeSet<DbId>,
) -> RecipientPredicate {
    let outcome = match caller.role {
        Some(UserRole::Student) => resolve_for_student(caller, criteria, class_teacher_positions),
        Some(UserRole::Parent) => resolve_for_parent(caller, criteria, class_teacher_positions),
        Some(UserRole::Superadmin | UserRole::BranchAdmin | UserRole::Staff) => {
            resolve_for_staff_like(caller, criteria, class_teacher_positions)
        }
        None => Err(EmptyReason::NotPermitted),
    };

    match outcome {
        Ok((branch_id, audience)) => RecipientPredicate::Match(Selection {
            exclude_user_id: caller.user_id,
            branch_id,
            audience,
            search: criteria.search.clone(),
        }),
        Err(reason) => RecipientPredicate::Nothing(reason),
    }
}

type Resolved = Result<(Option<DbId>, Audience), EmptyReason>;

fn resolve_for_student(
    caller: &CallerContext,
    criteria: &FilterCriteria,
    class_teacher_positions: &BTreeSet<DbId>,
) -> Resolved {
    let branch = caller.branch_id;
    match criteria.role {
        None => Err(EmptyReason::RoleRequired),
        Some(UserRole::Student) => {
            let class = criteria
                .student_class_id
                .ok_or(EmptyReason::StudentClassRequired)?;
            Ok((
                branch,
                Audience::Students {
                    student_class_id: Some(class),
                    class_arm_id: criteria.class_arm_id,
                },
            ))
        }
        Some(UserRole::Parent) => {
            if caller.linked_parent_ids.is_empty() {
                return Err(EmptyReason::ParentUnresolvable);
            }
            Ok((branch, Audience::Users(caller.linked_parent_ids.clone())))
        }
        Some(UserRole::Staff) => {
            let staff_type = criteria.staff_type.ok_or(EmptyReason::StaffTypeRequired)?;
            let filter = staff_filter(
                staff_type,
                criteria,
                class_teacher_positions,
                FAMILY_STAFF_SCOPE,
            )?;
            Ok((branch, Audience::Staff(filter)))
        }
        // Criteria parsing never yields these; hand-built criteria might.
        Some(UserRole::Superadmin | UserRole::BranchAdmin) => Err(EmptyReason::NotPermitted),
    }
}

fn resolve_for_parent(
    caller: &CallerContext,
    criteria: &FilterCriteria,
    class_teacher_positions: &BTreeSet<DbId>,
) -> Resolved {
    if !matches!(criteria.role, None | Some(UserRole::Staff)) {
        return Err(EmptyReason::NotPermitted);
    }
    if criteria.staff_type != Some(StaffType::Teaching) {
        return Err(EmptyReason::NotPermitted);
    }
    if !criteria
        .teaching_positions
        .iter()
        .any(|id| class_teacher_positions.contains(id))
    {
        return Err(EmptyReason::ClassTeacherRequired);
    }
    let slot = criteria
        .class_slot()
        .ok_or(EmptyReason::ClassArmPairRequired)?;
    if !caller.child_placements.contains(&slot) {
        return Err(EmptyReason::NotPermitted);
    }

    let filter = staff_filter(
        StaffType::Teaching,
        criteria,
        class_teacher_positions,
        FAMILY_STAFF_SCOPE,
    )?;
    Ok((caller.branch_id, Audience::Staff(filter)))
}

fn resolve_for_staff_like(
    caller: &CallerContext,
    criteria: &FilterCriteria,
    class_teacher_positions: &BTreeSet<DbId>,
) -> Resolved {
    let branch = criteria.branch_id.ok_or(EmptyReason::BranchRequired)?;

    let isolated = caller.role.is_some_and(UserRole::is_branch_isolated);
    if isolated {
        if let Some(own) = caller.branch_id {
            if own != branch {
                return Err(EmptyReason::OutsideBranch);
            }
        }
    }

    let audience = match (criteria.role, criteria.staff_type) {
        (Some(UserRole::Staff), Some(staff_type)) => Audience::Staff(staff_filter(
            staff_type,
            criteria,
            class_teacher_positions,
            STAFF_LIKE_STAFF_SCOPE,
        )?),
        (Some(UserRole::Student), _) => Audience::Students {
            student_class_id: criteria.student_class_id,
            class_arm_id: criteria.class_arm_id,
        },
        (Some(role), _) => Audience::Role(role),
        (None, _) => Audience::Anyone,
    };
    Ok((Some(branch), audience))
}

/// Build the position-based staff filter shared by every caller role.
///
/// A single bucket accepts staff typed for it or typed `both`; `both`
/// accepts every staff type. Fails with [`EmptyReason::PositionsRequired`]
/// when the bucket(s) named by `staff_type` have no submitted positions, and
/// with [`EmptyReason::ClassArmPairRequired`] when a class-teacher position
/// is submitted without both a class and an arm.
pub fn staff_filter(
    staff_type: StaffType,
    criteria: &FilterCriteria,
    class_teacher_positions: &BTreeSet<DbId>,
    role_scope: &[UserRole],
) -> Result<StaffFilter, EmptyReason> {
    let teaching = if staff_type.includes_teaching() {
        criteria.teaching_positions.clone()
    } else {
        Vec::new()
    };
    let non_teaching = if staff_type.includes_non_teaching() {
        criteria.non_teaching_positions.clone()
    } else {
        Vec::new()
    };

    let missing = match staff_type {
        StaffType::Teaching => teaching.is_empty(),
        StaffType::NonTeaching => non_teaching.is_empty(),
        StaffType::Both => teaching.is_empty() && non_teaching.is_empty(),
    };
    if missing {
        return Err(EmptyReason::PositionsRequired(staff_type));
    }

    let managing = if teaching
        .iter()
        .any(|id| class_teacher_positions.contains(id))
    {
        Some(
            criteria
                .class_slot()
                .ok_or(EmptyReason::ClassArmPairRequired)?,
        )
    } else {
        None
    };

    let staff_types = match staff_type {
        StaffType::Teaching => vec![StaffType::Teaching, StaffType::Both],
        StaffType::NonTeaching => vec![StaffType::NonTeaching, StaffType::Both],
        StaffType::Both => Vec::new(),
    };

    Ok(StaffFilter {
        role_scope: role_scope.to_vec(),
        staff_types,
        teaching_positions: teaching,
        non_teaching_positions: non_teaching,
        managing,
    })
}

// ---------------------------------------------------------------------------
// In-memory evaluation
// ---------------------------------------------------------------------------

/// A directory user with everything the predicate can look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: DbId,
    pub role: Option<UserRole>,
    pub staff_type: Option<StaffType>,
    pub branch_id: Option<DbId>,
    pub is_active: bool,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub teaching_position_ids: Vec<DbId>,
    pub non_teaching_position_ids: Vec<DbId>,
    pub assignments: Vec<AssignmentRecord>,
    pub placement: Option<ClassSlot>,
}

/// Indirect position assignment, optionally naming the class it manages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub teaching_position_id: Option<DbId>,
    pub non_teaching_position_id: Option<DbId>,
    pub managing: Option<ClassSlot>,
}

impl Selection {
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        if !entry.is_active || entry.id == self.exclude_user_id {
            return false;
        }
        if let Some(branch) = self.branch_id {
            if entry.branch_id != Some(branch) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let hit = [&entry.first_name, &entry.last_name, &entry.email]
                .iter()
                .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        self.audience.matches(entry)
    }
}

impl Audience {
    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Audience::Anyone => true,
            Audience::Role(role) => entry.role == Some(*role),
            Audience::Students {
                student_class_id,
                class_arm_id,
            } => {
                if entry.role != Some(UserRole::Student) {
                    return false;
                }
                match (student_class_id, entry.placement) {
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(class), Some(placed)) => {
                        placed.student_class_id == *class
                            && class_arm_id.map_or(true, |arm| placed.class_arm_id == arm)
                    }
                }
            }
            Audience::Users(ids) => ids.contains(&entry.id),
            Audience::Staff(filter) => filter.matches(entry),
        }
    }
}

impl StaffFilter {
    fn matches(&self, entry: &DirectoryEntry) -> bool {
        if !entry.role.is_some_and(|r| self.role_scope.contains(&r)) {
            return false;
        }
        if entry.role == Some(UserRole::Staff)
            && !self.staff_types.is_empty()
            && !entry
                .staff_type
                .is_some_and(|t| self.staff_types.contains(&t))
        {
            return false;
        }

        let holds_teaching = entry
            .teaching_position_ids
            .iter()
            .chain(entry.assignments.iter().filter_map(|a| a.teaching_position_id.as_ref()))
            .any(|id| self.teaching_positions.contains(id));
        let holds_non_teaching = entry
            .non_teaching_position_ids
            .iter()
            .chain(
                entry
                    .assignments
                    .iter()
                    .filter_map(|a| a.non_teaching_position_id.as_ref()),
            )
            .any(|id| self.non_teaching_positions.contains(id));
        if !(holds_teaching || holds_non_teaching) {
            return false;
        }

        match self.managing {
            Some(slot) => entry.assignments.iter().any(|a| a.managing == Some(slot)),
            None => true,
        }
    }
}

impl RecipientPredicate {
    /// Evaluate against an in-memory directory, ordered and deduplicated by id.
    pub fn apply<'a>(&self, directory: &'a [DirectoryEntry]) -> Vec<&'a DirectoryEntry> {
        let RecipientPredicate::Match(selection) = self else {
            return Vec::new();
        };
        let mut hits: Vec<&DirectoryEntry> =
            directory.iter().filter(|e| selection.matches(e)).collect();
        hits.sort_by_key(|e| e.id);
        hits.dedup_by_key(|e| e.id);
        hits
    }

    pub fn empty_reason(&self) -> Option<EmptyReason> {
        match self {
            RecipientPredicate::Nothing(reason) => Some(*reason),
            RecipientPredicate::Match(_) => None,
        }
    }
}
