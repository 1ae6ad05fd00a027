//! Files attached to a communication.

use lagooz_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `communication_attachments` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommunicationAttachment {
    pub id: DbId,
    pub communication_id: DbId,
    pub file_name: String,
    pub stored_path: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub created_at: Timestamp,
}

/// Input for recording a stored attachment.
#[derive(Debug, Clone)]
pub struct CreateCommunicationAttachment {
    pub file_name: String,
    pub stored_path: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}
