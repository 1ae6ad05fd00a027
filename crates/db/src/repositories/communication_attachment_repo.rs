//! Repository for the `communication_attachments` table.

use lagooz_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::communication_attachment::{
    CommunicationAttachment, CreateCommunicationAttachment,
};

const COLUMNS: &str =
    "id, communication_id, file_name, stored_path, content_type, size_bytes, created_at";

pub struct CommunicationAttachmentRepo;

impl CommunicationAttachmentRepo {
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        communication_id: DbId,
        input: &CreateCommunicationAttachment,
    ) -> Result<CommunicationAttachment, sqlx::Error> {
        let query = format!(
            "INSERT INTO communication_attachments
                (communication_id, file_name, stored_path, content_type, size_bytes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CommunicationAttachment>(&query)
            .bind(communication_id)
            .bind(&input.file_name)
            .bind(&input.stored_path)
            .bind(&input.content_type)
            .bind(input.size_bytes)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CommunicationAttachment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM communication_attachments WHERE id = $1");
        sqlx::query_as::<_, CommunicationAttachment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Attachments of a communication in upload order.
    pub async fn list_for_communication(
        pool: &PgPool,
        communication_id: DbId,
    ) -> Result<Vec<CommunicationAttachment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM communication_attachments
             WHERE communication_id = $1
             ORDER BY id"
        );
        sqlx::query_as::<_, CommunicationAttachment>(&query)
            .bind(communication_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_communication(
        pool: &PgPool,
        communication_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM communication_attachments WHERE communication_id = $1",
        )
        .bind(communication_id)
        .fetch_one(pool)
        .await
    }
}
