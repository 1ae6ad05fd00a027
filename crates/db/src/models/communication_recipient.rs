//! In-app deliveries of a communication.

use lagooz_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `communication_recipients` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommunicationRecipient {
    pub id: DbId,
    pub communication_id: DbId,
    pub recipient_id: DbId,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub deleted: bool,
    pub has_responded: bool,
    pub created_at: Timestamp,
}

/// An inbox entry: a delivery joined with its communication and sender.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InboxItem {
    pub delivery_id: DbId,
    pub communication_id: DbId,
    pub sender_id: DbId,
    pub sender_name: String,
    pub title: String,
    pub message: String,
    pub requires_response: bool,
    pub is_read: bool,
    pub has_responded: bool,
    pub sent_at: Option<Timestamp>,
    pub delivered_at: Timestamp,
}

/// A recipient's answer to a communication that asked for one.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommunicationReply {
    pub id: DbId,
    pub delivery_id: DbId,
    pub responder_id: DbId,
    pub reply_text: String,
    pub created_at: Timestamp,
}
