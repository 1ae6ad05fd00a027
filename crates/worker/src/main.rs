//! Background worker that sends scheduled communications once they are due.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lagooz_events::dispatcher::DEFAULT_DISPATCH_INTERVAL;
use lagooz_events::{EmailConfig, EmailDelivery, ScheduledDispatcher, StandardDelivery};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lagooz_worker=debug,lagooz_events=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let interval = match std::env::var("DISPATCH_INTERVAL_SECS") {
        Ok(raw) => Duration::from_secs(
            raw.parse()
                .context("DISPATCH_INTERVAL_SECS must be a whole number of seconds")?,
        ),
        Err(_) => DEFAULT_DISPATCH_INTERVAL,
    };

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = lagooz_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    lagooz_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database connection pool created");

    let email = EmailConfig::from_env().map(EmailDelivery::new);
    if email.is_none() {
        tracing::warn!("SMTP_HOST not set, communications are delivered in-app only");
    }
    let delivery = Arc::new(StandardDelivery::new(pool.clone(), email));
    let dispatcher = ScheduledDispatcher::new(pool, delivery, interval);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT (Ctrl-C), stopping dispatcher");
        }
        shutdown.cancel();
    });

    tracing::info!(interval_secs = interval.as_secs(), "Scheduled dispatcher starting");
    dispatcher.run(cancel).await;
    tracing::info!("Worker stopped");
    Ok(())
}
