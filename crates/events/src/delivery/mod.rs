//! Handing a persisted communication to its recipients.
//!
//! Recipients are the ids frozen on the row at submission time plus the
//! validated manual emails. Nothing is re-resolved here.

pub mod email;

use std::collections::BTreeSet;

use async_trait::async_trait;
use lagooz_core::types::{DbId, Timestamp};
use lagooz_db::models::communication::Communication;
use lagooz_db::repositories::{
    CommunicationAttachmentRepo, CommunicationRecipientRepo, CommunicationRepo, UserRepo,
};
use lagooz_db::DbPool;

use self::email::{EmailDelivery, EmailError, OutgoingEmail};

// ---------------------------------------------------------------------------
// Error / report
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The mail transport could not be set up at all.
    #[error("Email delivery error: {0}")]
    Email(#[from] EmailError),
}

/// What a single delivery achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// In-app rows created by this call.
    pub in_app: u64,
    pub emailed: usize,
    pub email_failures: usize,
}

// ---------------------------------------------------------------------------
// Collaborator trait
// ---------------------------------------------------------------------------

/// Sends a claimed communication. Implementations must not change its sent
/// flag.
#[async_trait]
pub trait CommunicationDelivery: Send + Sync {
    async fn deliver(
        &self,
        communication: &Communication,
    ) -> Result<DeliveryReport, DeliveryError>;
}

/// In-app delivery rows for every frozen recipient, and one email per
/// distinct address when SMTP is configured.
pub struct StandardDelivery {
    pool: DbPool,
    email: Option<EmailDelivery>,
}

impl StandardDelivery {
    pub fn new(pool: DbPool, email: Option<EmailDelivery>) -> Self {
        Self { pool, email }
    }
}

#[async_trait]
impl CommunicationDelivery for StandardDelivery {
    async fn deliver(
        &self,
        communication: &Communication,
    ) -> Result<DeliveryReport, DeliveryError> {
        let mut report = DeliveryReport {
            in_app: CommunicationRecipientRepo::deliver(
                &self.pool,
                communication.id,
                &communication.selected_recipient_ids,
            )
            .await?,
            ..Default::default()
        };

        let Some(email) = &self.email else {
            if !communication.manual_emails.is_empty() {
                tracing::warn!(
                    communication_id = communication.id,
                    manual_email_count = communication.manual_emails.len(),
                    "SMTP not configured, manual emails not sent"
                );
            }
            return Ok(report);
        };

        let contacts =
            UserRepo::active_emails(&self.pool, &communication.selected_recipient_ids).await?;
        let addresses = email_addresses(
            contacts.iter().map(|(_, email)| email.as_str()),
            &communication.manual_emails,
        );
        let attachment_names: Vec<String> =
            CommunicationAttachmentRepo::list_for_communication(&self.pool, communication.id)
                .await?
                .into_iter()
                .map(|a| a.file_name)
                .collect();

        let outgoing = OutgoingEmail::compose(communication, &attachment_names);
        let tally = email.send_all(&addresses, &outgoing).await?;
        report.emailed = tally.sent;
        report.email_failures = tally.failed;
        Ok(report)
    }
}

/// Distinct lowercase addresses, directory contacts first.
fn email_addresses<'a>(
    contacts: impl IntoIterator<Item = &'a str>,
    manual: &'a [String],
) -> Vec<String> {
    let mut seen = BTreeSet::new();
    contacts
        .into_iter()
        .chain(manual.iter().map(String::as_str))
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty() && seen.insert(e.clone()))
        .collect()
}

/// What happens to a claimed communication whose delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Unsent and still due; the dispatcher tries again on its next tick.
    Requeue,
    /// Back in the sender's drafts, to be resubmitted by hand.
    ReturnToDrafts,
}

/// Claim communication `id` as sent at `now`, then deliver it.
///
/// Returns `Ok(None)` when the row was already claimed, already sent or is a
/// draft. If delivery fails the claim is released according to `on_failure`
/// and the delivery error is returned.
pub async fn send_now(
    pool: &DbPool,
    delivery: &dyn CommunicationDelivery,
    id: DbId,
    now: Timestamp,
    on_failure: OnFailure,
) -> Result<Option<DeliveryReport>, DeliveryError> {
    let Some(communication) = CommunicationRepo::claim_for_sending(pool, id, now).await? else {
        tracing::debug!(communication_id = id, "Communication already claimed or not sendable");
        return Ok(None);
    };

    let report = match delivery.deliver(&communication).await {
        Ok(report) => report,
        Err(e) => {
            let to_draft = on_failure == OnFailure::ReturnToDrafts;
            if let Err(release) = CommunicationRepo::release_claim(pool, id, to_draft).await {
                tracing::error!(
                    communication_id = id,
                    error = %release,
                    "Failed to release claim after delivery error"
                );
            }
            return Err(e);
        }
    };

    tracing::info!(
        communication_id = id,
        in_app = report.in_app,
        emailed = report.emailed,
        email_failures = report.email_failures,
        "Communication sent"
    );
    Ok(Some(report))
}
