//! Teaching and non-teaching positions, and indirect staff assignments.

use lagooz_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `teaching_positions` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TeachingPosition {
    pub id: DbId,
    pub name: String,
    pub is_class_teacher: bool,
    pub created_at: Timestamp,
}

/// A row from the `non_teaching_positions` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NonTeachingPosition {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

/// A row from the `staff_assignments` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StaffAssignment {
    pub id: DbId,
    pub user_id: DbId,
    pub teaching_position_id: Option<DbId>,
    pub non_teaching_position_id: Option<DbId>,
    pub student_class_id: Option<DbId>,
    pub class_arm_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// Input for creating an assignment record. Supplying a class and arm makes
/// the user the managing teacher of that pair.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateStaffAssignment {
    pub user_id: DbId,
    pub teaching_position_id: Option<DbId>,
    pub non_teaching_position_id: Option<DbId>,
    pub student_class_id: Option<DbId>,
    pub class_arm_id: Option<DbId>,
}
