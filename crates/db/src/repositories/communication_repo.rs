//! Repository for the `communications` table.

use lagooz_core::types::{DbId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::communication::{Communication, SaveCommunication};

/// Column list for communications queries.
const COLUMNS: &str = "id, sender_id, title, message, requires_response, is_draft, sent, \
    scheduled_time, sent_at, selected_recipient_ids, manual_emails, saved_filter_data, \
    created_at, updated_at";

pub struct CommunicationRepo;

impl CommunicationRepo {
    /// Insert a new communication, returning the created row. It starts unsent.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        input: &SaveCommunication,
    ) -> Result<Communication, sqlx::Error> {
        let query = format!(
            "INSERT INTO communications
                (sender_id, title, message, requires_response, is_draft, scheduled_time,
                 selected_recipient_ids, manual_emails, saved_filter_data)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(input.sender_id)
            .bind(&input.title)
            .bind(&input.message)
            .bind(input.requires_response)
            .bind(input.is_draft)
            .bind(input.scheduled_time)
            .bind(&input.selected_recipient_ids)
            .bind(&input.manual_emails)
            .bind(input.snapshot_json())
            .fetch_one(executor)
            .await
    }

    /// Overwrite an unsent draft owned by `input.sender_id`.
    ///
    /// Returns `None` when no such draft exists (wrong owner, already sent,
    /// or no longer a draft).
    pub async fn update_draft<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        input: &SaveCommunication,
    ) -> Result<Option<Communication>, sqlx::Error> {
        let query = format!(
            "UPDATE communications SET
                title = $3, message = $4, requires_response = $5, is_draft = $6,
                scheduled_time = $7, selected_recipient_ids = $8, manual_emails = $9,
                saved_filter_data = $10, updated_at = now()
             WHERE id = $1 AND sender_id = $2 AND is_draft AND NOT sent
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(id)
            .bind(input.sender_id)
            .bind(&input.title)
            .bind(&input.message)
            .bind(input.requires_response)
            .bind(input.is_draft)
            .bind(input.scheduled_time)
            .bind(&input.selected_recipient_ids)
            .bind(&input.manual_emails)
            .bind(input.snapshot_json())
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Communication>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM communications WHERE id = $1");
        sqlx::query_as::<_, Communication>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// A draft owned by `sender_id`, if it exists and has not been sent.
    pub async fn find_draft(
        pool: &PgPool,
        id: DbId,
        sender_id: DbId,
    ) -> Result<Option<Communication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM communications
             WHERE id = $1 AND sender_id = $2 AND is_draft AND NOT sent"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(id)
            .bind(sender_id)
            .fetch_optional(pool)
            .await
    }

    /// Drafts by a sender, newest first.
    pub async fn list_drafts(
        pool: &PgPool,
        sender_id: DbId,
    ) -> Result<Vec<Communication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM communications
             WHERE sender_id = $1 AND is_draft AND NOT sent
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(sender_id)
            .fetch_all(pool)
            .await
    }

    /// Unsent non-drafts by a sender, soonest first.
    pub async fn list_scheduled(
        pool: &PgPool,
        sender_id: DbId,
    ) -> Result<Vec<Communication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM communications
             WHERE sender_id = $1 AND NOT is_draft AND NOT sent
             ORDER BY COALESCE(scheduled_time, created_at) ASC, id ASC"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(sender_id)
            .fetch_all(pool)
            .await
    }

    /// Sent communications by a sender that they have not deleted, newest first.
    pub async fn list_outbox(
        pool: &PgPool,
        sender_id: DbId,
    ) -> Result<Vec<Communication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM communications
             WHERE sender_id = $1 AND sent AND NOT sender_deleted
             ORDER BY COALESCE(sent_at, created_at) DESC, id DESC"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(sender_id)
            .fetch_all(pool)
            .await
    }

    /// One outbox entry of `sender_id`.
    pub async fn find_sent(
        pool: &PgPool,
        id: DbId,
        sender_id: DbId,
    ) -> Result<Option<Communication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM communications
             WHERE id = $1 AND sender_id = $2 AND sent AND NOT sender_deleted"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(id)
            .bind(sender_id)
            .fetch_optional(pool)
            .await
    }

    /// Hide a sent communication from its sender's outbox. Recipients keep
    /// their copies. Returns `false` if there was nothing to hide.
    pub async fn delete_sent(
        pool: &PgPool,
        id: DbId,
        sender_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE communications SET sender_deleted = true, updated_at = now()
             WHERE id = $1 AND sender_id = $2 AND sent AND NOT sender_deleted",
        )
        .bind(id)
        .bind(sender_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hide every sent communication of `sender_id`, returning how many.
    pub async fn delete_all_sent(pool: &PgPool, sender_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE communications SET sender_deleted = true, updated_at = now()
             WHERE sender_id = $1 AND sent AND NOT sender_deleted",
        )
        .bind(sender_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Scheduled communications whose time has come, oldest schedule first.
    pub async fn list_due(
        pool: &PgPool,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<Communication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM communications
             WHERE NOT sent AND NOT is_draft
               AND scheduled_time IS NOT NULL AND scheduled_time <= $1
             ORDER BY scheduled_time ASC, id ASC
             LIMIT $2"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// How many communications [`list_due`](Self::list_due) would return
    /// without a limit.
    pub async fn count_due(pool: &PgPool, now: Timestamp) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM communications
             WHERE NOT sent AND NOT is_draft
               AND scheduled_time IS NOT NULL AND scheduled_time <= $1",
        )
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Mark an unsent non-draft communication sent before delivering it.
    ///
    /// Exactly one concurrent caller gets the row back; everyone else gets
    /// `None` and must not deliver.
    pub async fn claim_for_sending(
        pool: &PgPool,
        id: DbId,
        sent_at: Timestamp,
    ) -> Result<Option<Communication>, sqlx::Error> {
        let query = format!(
            "UPDATE communications SET sent = true, sent_at = $2, updated_at = now()
             WHERE id = $1 AND NOT sent AND NOT is_draft
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Communication>(&query)
            .bind(id)
            .bind(sent_at)
            .fetch_optional(pool)
            .await
    }

    /// Undo a claim after delivery failed. With `to_draft` the row returns
    /// to its sender's drafts; otherwise it is unsent and due again.
    pub async fn release_claim(
        pool: &PgPool,
        id: DbId,
        to_draft: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE communications
             SET sent = false, sent_at = NULL, is_draft = $2, updated_at = now()
             WHERE id = $1 AND sent",
        )
        .bind(id)
        .bind(to_draft)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete one unsent draft owned by `sender_id`. Returns `true` if deleted.
    pub async fn delete_draft(
        pool: &PgPool,
        id: DbId,
        sender_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM communications WHERE id = $1 AND sender_id = $2 AND is_draft AND NOT sent",
        )
        .bind(id)
        .bind(sender_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every unsent draft owned by `sender_id`, returning how many.
    pub async fn delete_all_drafts(pool: &PgPool, sender_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM communications WHERE sender_id = $1 AND is_draft AND NOT sent",
        )
        .bind(sender_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
