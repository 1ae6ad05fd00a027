//! Directory user models.

use lagooz_core::roles::{StaffType, UserRole};
use lagooz_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub staff_type: Option<String>,
    pub branch_id: Option<DbId>,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// The typed role, or `None` for a value outside the known set.
    pub fn user_role(&self) -> Option<UserRole> {
        UserRole::parse(&self.role)
    }

    pub fn user_staff_type(&self) -> Option<StaffType> {
        self.staff_type.as_deref().and_then(StaffType::parse)
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a directory user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub staff_type: Option<StaffType>,
    pub branch_id: Option<DbId>,
}
