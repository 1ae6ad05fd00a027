//! Repository for the `users` table.

use lagooz_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list for users queries.
const COLUMNS: &str = "id, email, first_name, last_name, role, staff_type, branch_id, \
    profile_picture, is_active, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, first_name, last_name, role, staff_type, branch_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(input.role.as_str())
            .bind(input.staff_type.map(|s| s.as_str()))
            .bind(input.branch_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an active user by primary key.
    pub async fn find_active(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1 AND is_active");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Activate or deactivate a user. Returns `true` if the row exists.
    pub async fn set_active(
        pool: &PgPool,
        id: DbId,
        is_active: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET is_active = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(is_active)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record that `parent_id` is a parent of `student_id`.
    pub async fn link_parent(
        pool: &PgPool,
        parent_id: DbId,
        student_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO parent_children (parent_id, student_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(parent_id)
        .bind(student_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Active parents linked to a student, by id.
    pub async fn linked_parent_ids(
        pool: &PgPool,
        student_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT pc.parent_id FROM parent_children pc
             JOIN users p ON p.id = pc.parent_id
             WHERE pc.student_id = $1 AND p.is_active
             ORDER BY pc.parent_id",
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    /// Emails of the active users among `ids`, ordered by id.
    pub async fn active_emails(
        pool: &PgPool,
        ids: &[DbId],
    ) -> Result<Vec<(DbId, String)>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as("SELECT id, email FROM users WHERE id = ANY($1) AND is_active ORDER BY id")
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
