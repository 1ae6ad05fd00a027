//! Repository for the `communication_recipients` table (in-app delivery)
//! and the replies recipients send back.

use lagooz_core::types::DbId;
use sqlx::PgPool;

use crate::models::communication_recipient::{
    CommunicationRecipient, CommunicationReply, InboxItem,
};

const COLUMNS: &str =
    "id, communication_id, recipient_id, is_read, read_at, deleted, has_responded, created_at";

const REPLY_COLUMNS: &str = "id, delivery_id, responder_id, reply_text, created_at";

/// Inbox entries visible to their recipient. Filtered on `cr.recipient_id`.
const SELECT_INBOX: &str = "SELECT cr.id AS delivery_id, c.id AS communication_id, c.sender_id,
        TRIM(s.first_name || ' ' || s.last_name) AS sender_name,
        c.title, c.message, c.requires_response, cr.is_read, cr.has_responded, c.sent_at,
        cr.created_at AS delivered_at
     FROM communication_recipients cr
     JOIN communications c ON c.id = cr.communication_id
     JOIN users s ON s.id = c.sender_id
     WHERE NOT cr.deleted AND c.sent AND cr.recipient_id = $1";

pub struct CommunicationRecipientRepo;

impl CommunicationRecipientRepo {
    /// Deliver a communication to each active user in `recipient_ids`.
    ///
    /// Repeated deliveries are ignored. Returns the number of new rows.
    pub async fn deliver(
        pool: &PgPool,
        communication_id: DbId,
        recipient_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        if recipient_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "INSERT INTO communication_recipients (communication_id, recipient_id)
             SELECT $1, u.id FROM users u
             WHERE u.id = ANY($2) AND u.is_active
             ON CONFLICT ON CONSTRAINT uq_communication_recipients DO NOTHING",
        )
        .bind(communication_id)
        .bind(recipient_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_communication(
        pool: &PgPool,
        communication_id: DbId,
    ) -> Result<Vec<CommunicationRecipient>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM communication_recipients
             WHERE communication_id = $1
             ORDER BY recipient_id"
        );
        sqlx::query_as::<_, CommunicationRecipient>(&query)
            .bind(communication_id)
            .fetch_all(pool)
            .await
    }

    /// Non-deleted deliveries of sent communications to a user, newest first.
    pub async fn list_inbox(
        pool: &PgPool,
        recipient_id: DbId,
    ) -> Result<Vec<InboxItem>, sqlx::Error> {
        let query = format!("{SELECT_INBOX} ORDER BY cr.created_at DESC, cr.id DESC");
        sqlx::query_as::<_, InboxItem>(&query)
            .bind(recipient_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_inbox_item(
        pool: &PgPool,
        delivery_id: DbId,
        recipient_id: DbId,
    ) -> Result<Option<InboxItem>, sqlx::Error> {
        let query = format!("{SELECT_INBOX} AND cr.id = $2");
        sqlx::query_as::<_, InboxItem>(&query)
            .bind(recipient_id)
            .bind(delivery_id)
            .fetch_optional(pool)
            .await
    }

    /// Mark a delivery read. The first read time is kept.
    pub async fn mark_read(
        pool: &PgPool,
        delivery_id: DbId,
        recipient_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE communication_recipients
             SET is_read = true, read_at = COALESCE(read_at, now())
             WHERE id = $1 AND recipient_id = $2 AND NOT deleted",
        )
        .bind(delivery_id)
        .bind(recipient_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove one delivery from its recipient's inbox. The sender's copy is
    /// untouched.
    pub async fn delete_from_inbox(
        pool: &PgPool,
        delivery_id: DbId,
        recipient_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE communication_recipients SET deleted = true
             WHERE id = $1 AND recipient_id = $2 AND NOT deleted",
        )
        .bind(delivery_id)
        .bind(recipient_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_from_inbox(
        pool: &PgPool,
        recipient_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE communication_recipients SET deleted = true
             WHERE recipient_id = $1 AND NOT deleted",
        )
        .bind(recipient_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Whether `user_id` holds a visible delivery of a sent communication.
    pub async fn has_delivery(
        pool: &PgPool,
        communication_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM communication_recipients cr
                JOIN communications c ON c.id = cr.communication_id
                WHERE cr.communication_id = $1 AND cr.recipient_id = $2
                  AND NOT cr.deleted AND c.sent
             )",
        )
        .bind(communication_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Store a reply and flag the delivery as answered, atomically.
    pub async fn record_reply(
        pool: &PgPool,
        delivery_id: DbId,
        responder_id: DbId,
        reply_text: &str,
    ) -> Result<CommunicationReply, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let insert = format!(
            "INSERT INTO communication_replies (delivery_id, responder_id, reply_text)
             VALUES ($1, $2, $3)
             RETURNING {REPLY_COLUMNS}"
        );
        let reply = sqlx::query_as::<_, CommunicationReply>(&insert)
            .bind(delivery_id)
            .bind(responder_id)
            .bind(reply_text)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE communication_recipients SET has_responded = true WHERE id = $1")
            .bind(delivery_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(reply)
    }

    /// Replies to every delivery of a communication, oldest first.
    pub async fn list_replies(
        pool: &PgPool,
        communication_id: DbId,
    ) -> Result<Vec<CommunicationReply>, sqlx::Error> {
        sqlx::query_as::<_, CommunicationReply>(
            "SELECT r.id, r.delivery_id, r.responder_id, r.reply_text, r.created_at
             FROM communication_replies r
             JOIN communication_recipients cr ON cr.id = r.delivery_id
             WHERE cr.communication_id = $1
             ORDER BY r.created_at, r.id",
        )
            .bind(communication_id)
            .fetch_all(pool)
            .await
    }
}
