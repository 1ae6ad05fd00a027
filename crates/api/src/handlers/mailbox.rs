//! The caller's drafts, scheduled, sent and received communications, and
//! the actions a sender or recipient can take on them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lagooz_core::error::CoreError;
use lagooz_core::types::DbId;
use lagooz_db::models::communication::Communication;
use lagooz_db::models::communication_attachment::CommunicationAttachment;
use lagooz_db::models::communication_recipient::{
    CommunicationRecipient, CommunicationReply, InboxItem,
};
use lagooz_db::repositories::{
    CommunicationAttachmentRepo, CommunicationRecipientRepo, CommunicationRepo,
};
use serde::{Deserialize, Serialize};

use super::communications::DeletedCount;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireStaffLike;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/communications/drafts
pub async fn list_drafts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Communication>>>> {
    let drafts = CommunicationRepo::list_drafts(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: drafts }))
}

/// GET /api/v1/communications/scheduled
///
/// Unsent, non-draft communications, earliest first.
pub async fn list_scheduled(
    RequireStaffLike(auth): RequireStaffLike,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Communication>>>> {
    let scheduled = CommunicationRepo::list_scheduled(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: scheduled }))
}

/// GET /api/v1/communications/outbox
pub async fn list_outbox(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Communication>>>> {
    let sent = CommunicationRepo::list_outbox(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: sent }))
}

/// GET /api/v1/communications/inbox
pub async fn list_inbox(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<InboxItem>>>> {
    let inbox = CommunicationRecipientRepo::list_inbox(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: inbox }))
}

// ---------------------------------------------------------------------------
// Inbox actions
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct InboxMessage {
    pub item: InboxItem,
    pub attachments: Vec<CommunicationAttachment>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

fn delivery_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Inbox item",
        id,
    })
}

/// POST /api/v1/communications/inbox/{id}/read
///
/// Marks the delivery read and returns it with its attachments.
pub async fn read_inbox_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<InboxMessage>>> {
    if !CommunicationRecipientRepo::mark_read(&state.pool, id, auth.user_id).await? {
        return Err(delivery_not_found(id));
    }
    let item = CommunicationRecipientRepo::find_inbox_item(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(|| delivery_not_found(id))?;
    let attachments =
        CommunicationAttachmentRepo::list_for_communication(&state.pool, item.communication_id)
            .await?;
    Ok(Json(DataResponse {
        data: InboxMessage { item, attachments },
    }))
}

/// DELETE /api/v1/communications/inbox/{id}
pub async fn delete_inbox_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !CommunicationRecipientRepo::delete_from_inbox(&state.pool, id, auth.user_id).await? {
        return Err(delivery_not_found(id));
    }
    tracing::info!(delivery_id = id, user_id = auth.user_id, "Inbox item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/communications/inbox/delete-all
pub async fn delete_all_inbox(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<DeletedCount>>> {
    let deleted =
        CommunicationRecipientRepo::delete_all_from_inbox(&state.pool, auth.user_id).await?;
    tracing::info!(user_id = auth.user_id, deleted, "Inbox cleared");
    Ok(Json(DataResponse {
        data: DeletedCount { deleted },
    }))
}

/// POST /api/v1/communications/inbox/{id}/reply
///
/// Only communications that ask for a response accept replies.
pub async fn reply_to_inbox_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<ReplyRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CommunicationReply>>)> {
    let reply = body.reply.trim();
    if reply.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Reply must not be empty".into(),
        )));
    }

    let item = CommunicationRecipientRepo::find_inbox_item(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(|| delivery_not_found(id))?;
    if !item.requires_response {
        return Err(AppError::Core(CoreError::Conflict(
            "This communication does not accept replies".into(),
        )));
    }

    let saved =
        CommunicationRecipientRepo::record_reply(&state.pool, id, auth.user_id, reply).await?;
    tracing::info!(
        delivery_id = id,
        communication_id = item.communication_id,
        user_id = auth.user_id,
        "Reply recorded"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: saved })))
}

// ---------------------------------------------------------------------------
// Outbox actions
// ---------------------------------------------------------------------------

/// A sent communication with its deliveries and the replies they drew.
#[derive(Debug, Serialize)]
pub struct OutboxDetail {
    pub communication: Communication,
    pub recipients: Vec<CommunicationRecipient>,
    pub replies: Vec<CommunicationReply>,
    pub attachments: Vec<CommunicationAttachment>,
}

fn sent_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Sent communication",
        id,
    })
}

/// GET /api/v1/communications/outbox/{id}
pub async fn get_outbox_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<OutboxDetail>>> {
    let communication = CommunicationRepo::find_sent(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(|| sent_not_found(id))?;
    let recipients = CommunicationRecipientRepo::list_for_communication(&state.pool, id).await?;
    let replies = CommunicationRecipientRepo::list_replies(&state.pool, id).await?;
    let attachments = CommunicationAttachmentRepo::list_for_communication(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: OutboxDetail {
            communication,
            recipients,
            replies,
            attachments,
        },
    }))
}

/// DELETE /api/v1/communications/outbox/{id}
///
/// Hides the communication from its sender. Recipients keep their copies.
pub async fn delete_outbox_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !CommunicationRepo::delete_sent(&state.pool, id, auth.user_id).await? {
        return Err(sent_not_found(id));
    }
    tracing::info!(communication_id = id, user_id = auth.user_id, "Sent communication deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/communications/outbox/delete-all
pub async fn delete_all_outbox(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<DeletedCount>>> {
    let deleted = CommunicationRepo::delete_all_sent(&state.pool, auth.user_id).await?;
    tracing::info!(user_id = auth.user_id, deleted, "Outbox cleared");
    Ok(Json(DataResponse {
        data: DeletedCount { deleted },
    }))
}
