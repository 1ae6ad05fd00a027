//! Communication models and DTOs.

use lagooz_core::communication::{is_due, CommunicationStatus};
use lagooz_core::targeting::SavedFilterData;
use lagooz_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `communications` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Communication {
    pub id: DbId,
    pub sender_id: DbId,
    pub title: String,
    pub message: String,
    pub requires_response: bool,
    pub is_draft: bool,
    pub sent: bool,
    pub scheduled_time: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
    pub selected_recipient_ids: Vec<DbId>,
    pub manual_emails: Vec<String>,
    pub saved_filter_data: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Communication {
    pub fn status(&self) -> CommunicationStatus {
        CommunicationStatus::from_flags(self.is_draft, self.sent)
    }

    /// The stored filter snapshot. Unreadable snapshots load as empty.
    pub fn snapshot(&self) -> SavedFilterData {
        serde_json::from_value(self.saved_filter_data.clone()).unwrap_or_default()
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        is_due(self.scheduled_time, now)
    }
}

// ---------------------------------------------------------------------------
// Create / update DTO
// ---------------------------------------------------------------------------

/// Everything persisted for an accepted submission, new or a draft re-save.
#[derive(Debug, Clone)]
pub struct SaveCommunication {
    pub sender_id: DbId,
    pub title: String,
    pub message: String,
    pub requires_response: bool,
    pub is_draft: bool,
    pub scheduled_time: Option<Timestamp>,
    pub selected_recipient_ids: Vec<DbId>,
    pub manual_emails: Vec<String>,
    pub saved_filter_data: SavedFilterData,
}

impl SaveCommunication {
    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.saved_filter_data).unwrap_or_else(|_| serde_json::json!({}))
    }
}
