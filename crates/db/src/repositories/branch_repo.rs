//! Repository for the `branches` table.

use lagooz_core::types::DbId;
use sqlx::PgPool;

use crate::models::branch::{Branch, CreateBranch};

/// Column list for branches queries.
const COLUMNS: &str = "id, name, created_at, updated_at";

pub struct BranchRepo;

impl BranchRepo {
    /// Insert a new branch, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateBranch) -> Result<Branch, sqlx::Error> {
        let query = format!("INSERT INTO branches (name) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, Branch>(&query)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Branch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM branches WHERE id = $1");
        sqlx::query_as::<_, Branch>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all branches alphabetically.
    pub async fn list(pool: &PgPool) -> Result<Vec<Branch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM branches ORDER BY name");
        sqlx::query_as::<_, Branch>(&query).fetch_all(pool).await
    }
}
