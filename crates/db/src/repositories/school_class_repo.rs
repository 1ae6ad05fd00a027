//! Repository for classes, arms, and student placements.

use lagooz_core::targeting::ClassSlot;
use lagooz_core::types::DbId;
use sqlx::PgPool;

use crate::models::school_class::{ClassArm, StudentClass};

pub struct SchoolClassRepo;

impl SchoolClassRepo {
    pub async fn create_class(pool: &PgPool, name: &str) -> Result<StudentClass, sqlx::Error> {
        sqlx::query_as::<_, StudentClass>(
            "INSERT INTO student_classes (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn create_arm(pool: &PgPool, name: &str) -> Result<ClassArm, sqlx::Error> {
        sqlx::query_as::<_, ClassArm>(
            "INSERT INTO class_arms (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Put a student in a class and arm, replacing any earlier placement.
    pub async fn place_student(
        pool: &PgPool,
        student_id: DbId,
        slot: ClassSlot,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO student_placements (student_id, student_class_id, class_arm_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (student_id) DO UPDATE
             SET student_class_id = EXCLUDED.student_class_id,
                 class_arm_id = EXCLUDED.class_arm_id,
                 updated_at = now()",
        )
        .bind(student_id)
        .bind(slot.student_class_id)
        .bind(slot.class_arm_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Placements of every child linked to a parent.
    pub async fn child_placements(
        pool: &PgPool,
        parent_id: DbId,
    ) -> Result<Vec<ClassSlot>, sqlx::Error> {
        let rows: Vec<(DbId, DbId)> = sqlx::query_as(
            "SELECT sp.student_class_id, sp.class_arm_id
             FROM parent_children pc
             JOIN student_placements sp ON sp.student_id = pc.student_id
             WHERE pc.parent_id = $1
             ORDER BY sp.student_class_id, sp.class_arm_id",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(student_class_id, class_arm_id)| ClassSlot {
                student_class_id,
                class_arm_id,
            })
            .collect())
    }
}
