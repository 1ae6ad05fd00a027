//! Scheduled communication dispatcher.
//!
//! [`ScheduledDispatcher`] runs as a background task, periodically picking up
//! non-draft communications whose scheduled time has passed and sending them
//! through the configured [`CommunicationDelivery`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lagooz_db::repositories::CommunicationRepo;
use lagooz_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::delivery::{send_now, CommunicationDelivery, OnFailure};

/// Default poll interval.
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_secs(60);

/// Maximum communications loaded per tick.
const DEFAULT_BATCH_SIZE: i64 = 100;

/// Outcome of one pass over the due communications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    /// Rows another sender claimed first.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// ScheduledDispatcher
// ---------------------------------------------------------------------------

pub struct ScheduledDispatcher {
    pool: DbPool,
    delivery: Arc<dyn CommunicationDelivery>,
    interval: Duration,
    batch_size: i64,
}

impl ScheduledDispatcher {
    pub fn new(
        pool: DbPool,
        delivery: Arc<dyn CommunicationDelivery>,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            delivery,
            interval,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run the dispatch loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduled dispatcher cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.dispatch_due().await {
                        tracing::error!(error = %e, "Failed to load due communications");
                    }
                }
            }
        }
    }

    /// Send every communication that is due now.
    ///
    /// A failure on one communication is logged and the rest still go out.
    /// The failed row is requeued and picked up again on the next tick.
    pub async fn dispatch_due(&self) -> Result<DispatchSummary, sqlx::Error> {
        let now = Utc::now();
        let due = CommunicationRepo::list_due(&self.pool, now, self.batch_size).await?;
        let mut summary = DispatchSummary::default();

        for communication in &due {
            let sent = send_now(
                &self.pool,
                self.delivery.as_ref(),
                communication.id,
                Utc::now(),
                OnFailure::Requeue,
            )
            .await;
            match sent {
                Ok(Some(_)) => summary.sent += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        communication_id = communication.id,
                        error = %e,
                        "Failed to dispatch scheduled communication"
                    );
                }
            }
        }

        if !due.is_empty() {
            tracing::info!(
                sent = summary.sent,
                failed = summary.failed,
                skipped = summary.skipped,
                "Processed scheduled communications"
            );
        }

        Ok(summary)
    }
}
