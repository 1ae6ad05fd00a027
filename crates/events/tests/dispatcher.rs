//! Integration tests for delivery and the scheduled dispatcher.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use lagooz_core::roles::UserRole;
use lagooz_core::targeting::SavedFilterData;
use lagooz_db::models::communication::{Communication, SaveCommunication};
use lagooz_db::models::user::{CreateUser, User};
use lagooz_db::repositories::{CommunicationRecipientRepo, CommunicationRepo, UserRepo};
use lagooz_events::{
    send_now, CommunicationDelivery, DeliveryError, DeliveryReport, DispatchSummary, OnFailure,
    ScheduledDispatcher, StandardDelivery,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Records delivered ids and fails any communication titled "boom".
#[derive(Default)]
struct RecordingDelivery {
    delivered: Mutex<Vec<i64>>,
}

#[async_trait]
impl CommunicationDelivery for RecordingDelivery {
    async fn deliver(
        &self,
        communication: &Communication,
    ) -> Result<DeliveryReport, DeliveryError> {
        if communication.title == "boom" {
            return Err(DeliveryError::Database(sqlx::Error::RowNotFound));
        }
        self.delivered.lock().unwrap().push(communication.id);
        Ok(DeliveryReport::default())
    }
}

async fn user(pool: &PgPool, email: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            first_name: "Ngozi".to_string(),
            last_name: "Eze".to_string(),
            role: UserRole::Staff,
            staff_type: None,
            branch_id: None,
        },
    )
    .await
    .unwrap()
}

async fn scheduled(
    pool: &PgPool,
    sender_id: i64,
    title: &str,
    at: chrono::DateTime<Utc>,
) -> Communication {
    CommunicationRepo::create(
        pool,
        &SaveCommunication {
            sender_id,
            title: title.to_string(),
            message: "Body".to_string(),
            requires_response: false,
            is_draft: false,
            scheduled_time: Some(at),
            selected_recipient_ids: Vec::new(),
            manual_emails: Vec::new(),
            saved_filter_data: SavedFilterData::default(),
        },
    )
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn dispatches_only_due_communications(pool: PgPool) {
    let sender = user(&pool, "sender@school.test").await;
    let now = Utc::now();
    let due = scheduled(&pool, sender.id, "due", now - Duration::minutes(1)).await;
    let later = scheduled(&pool, sender.id, "later", now + Duration::hours(2)).await;

    let delivery = Arc::new(RecordingDelivery::default());
    let dispatcher =
        ScheduledDispatcher::new(pool.clone(), delivery.clone(), StdDuration::from_secs(60));

    let summary = dispatcher.dispatch_due().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(*delivery.delivered.lock().unwrap(), vec![due.id]);

    let reloaded = CommunicationRepo::find_by_id(&pool, due.id).await.unwrap().unwrap();
    assert!(reloaded.sent);
    assert!(reloaded.sent_at.is_some());
    let untouched = CommunicationRepo::find_by_id(&pool, later.id).await.unwrap().unwrap();
    assert!(!untouched.sent);

    // Already sent, so a second pass delivers nothing.
    let again = dispatcher.dispatch_due().await.unwrap();
    assert_eq!(again.sent, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn one_failure_does_not_stop_the_batch(pool: PgPool) {
    let sender = user(&pool, "sender@school.test").await;
    let past = Utc::now() - Duration::minutes(10);
    let failing = scheduled(&pool, sender.id, "boom", past).await;
    let fine = scheduled(&pool, sender.id, "fine", past).await;

    let delivery = Arc::new(RecordingDelivery::default());
    let dispatcher =
        ScheduledDispatcher::new(pool.clone(), delivery.clone(), StdDuration::from_secs(60));

    let summary = dispatcher.dispatch_due().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);

    let failed = CommunicationRepo::find_by_id(&pool, failing.id).await.unwrap().unwrap();
    assert!(!failed.sent);
    assert!(failed.sent_at.is_none());
    assert!(!failed.is_draft);
    let sent = CommunicationRepo::find_by_id(&pool, fine.id).await.unwrap().unwrap();
    assert!(sent.sent);

    // Requeued, so the next tick tries it again.
    let retry = dispatcher.dispatch_due().await.unwrap();
    assert_eq!(retry.sent, 0);
    assert_eq!(retry.failed, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn overlapping_passes_deliver_each_row_once(pool: PgPool) {
    let sender = user(&pool, "sender@school.test").await;
    let past = Utc::now() - Duration::minutes(5);
    let mut ids = Vec::new();
    for title in ["one", "two", "three"] {
        ids.push(scheduled(&pool, sender.id, title, past).await.id);
    }

    let delivery = Arc::new(RecordingDelivery::default());
    let first =
        ScheduledDispatcher::new(pool.clone(), delivery.clone(), StdDuration::from_secs(60));
    let second =
        ScheduledDispatcher::new(pool.clone(), delivery.clone(), StdDuration::from_secs(60));

    let (a, b) = tokio::join!(first.dispatch_due(), second.dispatch_due());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.sent + b.sent, 3);
    assert_eq!(a.failed + b.failed, 0);

    let mut delivered = delivery.delivered.lock().unwrap().clone();
    delivered.sort_unstable();
    assert_eq!(delivered, ids);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn already_claimed_row_is_skipped(pool: PgPool) {
    let sender = user(&pool, "sender@school.test").await;
    let comm = scheduled(&pool, sender.id, "claimed", Utc::now() - Duration::minutes(1)).await;
    CommunicationRepo::claim_for_sending(&pool, comm.id, Utc::now())
        .await
        .unwrap()
        .unwrap();

    let delivery = RecordingDelivery::default();
    let outcome = send_now(&pool, &delivery, comm.id, Utc::now(), OnFailure::Requeue)
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert!(delivery.delivered.lock().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_send_can_return_to_drafts(pool: PgPool) {
    let sender = user(&pool, "sender@school.test").await;
    let comm = scheduled(&pool, sender.id, "boom", Utc::now() - Duration::minutes(1)).await;

    let delivery = RecordingDelivery::default();
    let err = send_now(&pool, &delivery, comm.id, Utc::now(), OnFailure::ReturnToDrafts)
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Database(_)));

    let reloaded = CommunicationRepo::find_by_id(&pool, comm.id).await.unwrap().unwrap();
    assert!(reloaded.is_draft);
    assert!(!reloaded.sent);
    assert!(reloaded.sent_at.is_none());

    // Drafts are never due.
    let dispatcher =
        ScheduledDispatcher::new(pool.clone(), Arc::new(delivery), StdDuration::from_secs(60));
    let summary = dispatcher.dispatch_due().await.unwrap();
    assert_eq!(summary, DispatchSummary::default());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn standard_delivery_creates_in_app_rows(pool: PgPool) {
    let sender = user(&pool, "sender@school.test").await;
    let reader = user(&pool, "reader@school.test").await;
    let comm = CommunicationRepo::create(
        &pool,
        &SaveCommunication {
            sender_id: sender.id,
            title: "Staff meeting".to_string(),
            message: "Hall, 3pm.".to_string(),
            requires_response: true,
            is_draft: false,
            scheduled_time: None,
            selected_recipient_ids: vec![reader.id],
            manual_emails: vec!["visitor@home.test".to_string()],
            saved_filter_data: SavedFilterData::default(),
        },
    )
    .await
    .unwrap();

    let delivery = StandardDelivery::new(pool.clone(), None);
    let report = send_now(&pool, &delivery, comm.id, Utc::now(), OnFailure::ReturnToDrafts)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.in_app, 1);
    assert_eq!(report.emailed, 0);

    let inbox = CommunicationRecipientRepo::list_inbox(&pool, reader.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "Staff meeting");
    assert!(inbox[0].requires_response);
}
