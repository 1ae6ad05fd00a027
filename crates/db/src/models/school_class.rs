//! Classes, arms, and where students sit.

use lagooz_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `student_classes` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudentClass {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

/// A row from the `class_arms` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClassArm {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}
