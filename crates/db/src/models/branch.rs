//! Branch models: the campuses users are partitioned into.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use lagooz_core::types::{DbId, Timestamp};

/// A row from the `branches` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Branch {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for creating a branch.
#[derive(Debug, Deserialize)]
pub struct CreateBranch {
    pub name: String,
}
