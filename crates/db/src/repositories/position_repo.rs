//! Repository for positions and staff assignment records.

use std::collections::BTreeSet;

use lagooz_core::types::DbId;
use sqlx::PgPool;

use crate::models::position::{
    CreateStaffAssignment, NonTeachingPosition, StaffAssignment, TeachingPosition,
};

const TEACHING_COLUMNS: &str = "id, name, is_class_teacher, created_at";
const NON_TEACHING_COLUMNS: &str = "id, name, created_at";
const ASSIGNMENT_COLUMNS: &str = "id, user_id, teaching_position_id, non_teaching_position_id, \
    student_class_id, class_arm_id, created_at";

pub struct PositionRepo;

impl PositionRepo {
    pub async fn create_teaching(
        pool: &PgPool,
        name: &str,
        is_class_teacher: bool,
    ) -> Result<TeachingPosition, sqlx::Error> {
        let query = format!(
            "INSERT INTO teaching_positions (name, is_class_teacher) VALUES ($1, $2)
             RETURNING {TEACHING_COLUMNS}"
        );
        sqlx::query_as::<_, TeachingPosition>(&query)
            .bind(name)
            .bind(is_class_teacher)
            .fetch_one(pool)
            .await
    }

    pub async fn create_non_teaching(
        pool: &PgPool,
        name: &str,
    ) -> Result<NonTeachingPosition, sqlx::Error> {
        let query = format!(
            "INSERT INTO non_teaching_positions (name) VALUES ($1) RETURNING {NON_TEACHING_COLUMNS}"
        );
        sqlx::query_as::<_, NonTeachingPosition>(&query)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn list_teaching(pool: &PgPool) -> Result<Vec<TeachingPosition>, sqlx::Error> {
        let query = format!("SELECT {TEACHING_COLUMNS} FROM teaching_positions ORDER BY name");
        sqlx::query_as::<_, TeachingPosition>(&query).fetch_all(pool).await
    }

    pub async fn list_non_teaching(
        pool: &PgPool,
    ) -> Result<Vec<NonTeachingPosition>, sqlx::Error> {
        let query =
            format!("SELECT {NON_TEACHING_COLUMNS} FROM non_teaching_positions ORDER BY name");
        sqlx::query_as::<_, NonTeachingPosition>(&query).fetch_all(pool).await
    }

    /// Link a user directly to a teaching position.
    pub async fn assign_teaching(
        pool: &PgPool,
        user_id: DbId,
        position_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_teaching_positions (user_id, teaching_position_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(position_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Link a user directly to a non-teaching position.
    pub async fn assign_non_teaching(
        pool: &PgPool,
        user_id: DbId,
        position_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_non_teaching_positions (user_id, non_teaching_position_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(position_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Insert an indirect assignment record.
    pub async fn create_assignment(
        pool: &PgPool,
        input: &CreateStaffAssignment,
    ) -> Result<StaffAssignment, sqlx::Error> {
        let query = format!(
            "INSERT INTO staff_assignments
                (user_id, teaching_position_id, non_teaching_position_id,
                 student_class_id, class_arm_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ASSIGNMENT_COLUMNS}"
        );
        sqlx::query_as::<_, StaffAssignment>(&query)
            .bind(input.user_id)
            .bind(input.teaching_position_id)
            .bind(input.non_teaching_position_id)
            .bind(input.student_class_id)
            .bind(input.class_arm_id)
            .fetch_one(pool)
            .await
    }

    /// Which of `ids` are class-teacher positions.
    pub async fn class_teacher_ids(
        pool: &PgPool,
        ids: &[DbId],
    ) -> Result<BTreeSet<DbId>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let rows: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM teaching_positions WHERE is_class_teacher AND id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
