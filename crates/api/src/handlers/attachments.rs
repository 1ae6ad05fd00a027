//! Attachment downloads, open to the sender and to recipients holding a
//! delivery of the communication.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use lagooz_core::error::CoreError;
use lagooz_core::types::DbId;
use lagooz_db::repositories::{
    CommunicationAttachmentRepo, CommunicationRecipientRepo, CommunicationRepo,
};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Attachment",
        id,
    })
}

/// GET /api/v1/communications/attachments/{id}
///
/// Anyone else gets a 404, so attachment ids are not confirmed to exist.
pub async fn download_attachment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let attachment = CommunicationAttachmentRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let is_sender = CommunicationRepo::find_by_id(&state.pool, attachment.communication_id)
        .await?
        .is_some_and(|c| c.sender_id == auth.user_id);
    let allowed = is_sender
        || CommunicationRecipientRepo::has_delivery(
            &state.pool,
            attachment.communication_id,
            auth.user_id,
        )
        .await?;
    if !allowed {
        return Err(not_found(id));
    }

    let path = state.config.attachment_storage_dir.join(&attachment.stored_path);
    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(attachment_id = id, path = %path.display(), "Attachment file missing");
            return Err(not_found(id));
        }
        Err(e) => return Err(e.into()),
    };

    let content_type = attachment
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment.file_name.replace('"', "")
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
