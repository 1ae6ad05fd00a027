use std::path::Path;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use lagooz_db::repositories::CommunicationRepo;
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `"ok"` when every check passes, otherwise `"degraded"`.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Whether new attachments can be written to the storage directory.
    pub storage_writable: bool,
    /// Scheduled communications already due but not yet dispatched.
    /// Absent when the database is unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_communications: Option<i64>,
}

/// Create and remove a marker file in `dir`.
async fn storage_writable(dir: &Path) -> bool {
    let marker = dir.join(format!(".health-{}", Uuid::new_v4().simple()));
    let written = match tokio::fs::create_dir_all(dir).await {
        Ok(()) => tokio::fs::write(&marker, b"ok").await,
        Err(e) => Err(e),
    };
    match written {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(&marker).await {
                tracing::warn!(error = %e, "Failed to remove storage health marker");
            }
            true
        }
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Attachment storage not writable");
            false
        }
    }
}

/// GET /health -- returns service, database and attachment storage health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = lagooz_db::health_check(&state.pool).await.is_ok();
    let due_communications = if db_healthy {
        CommunicationRepo::count_due(&state.pool, Utc::now()).await.ok()
    } else {
        None
    };
    let storage_writable = storage_writable(&state.config.attachment_storage_dir).await;

    let status = if db_healthy && storage_writable {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        storage_writable,
        due_communications,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
