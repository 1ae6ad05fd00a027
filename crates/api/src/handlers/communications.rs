//! Handlers for composing communications and managing drafts.
//!
//! New submissions and draft re-submissions share one pipeline: the filter
//! snapshot is re-resolved, the selected ids are cut down to the allowed
//! set, everything is reviewed at once, and an accepted submission is
//! persisted with its recipients frozen, together with its attachments, in
//! one transaction. Only a submission that is due is sent before the
//! response is returned; if that send fails the communication goes back to
//! the sender's drafts.

use std::path::PathBuf;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use lagooz_core::communication::attachments::sanitize_file_name;
use lagooz_core::communication::lifecycle::state_machine;
use lagooz_core::communication::{
    review_submission, AttachmentMeta, CommunicationStatus, DispatchPlan, SubmissionErrors,
    SubmissionInput,
};
use lagooz_core::error::CoreError;
use lagooz_core::targeting::controller::Candidate;
use lagooz_core::targeting::{SavedFilterData, SavedFilterFields};
use lagooz_core::types::DbId;
use lagooz_db::models::communication::{Communication, SaveCommunication};
use lagooz_db::models::communication_attachment::{
    CommunicationAttachment, CreateCommunicationAttachment,
};
use lagooz_db::repositories::{CommunicationAttachmentRepo, CommunicationRepo, RecipientRepo};
use lagooz_events::{send_now, OnFailure};
use serde::Serialize;
use uuid::Uuid;

use super::{load_caller, predicate_for, Caller};
use crate::error::{AppError, AppResult};
use crate::form::{SubmissionForm, UploadedFile};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub communication: Communication,
    /// `"sent"`, `"scheduled"` or `"draft"`.
    pub outcome: &'static str,
    pub warnings: Vec<String>,
    pub attachments: Vec<CommunicationAttachment>,
}

/// Everything needed to reopen a draft in the compose form.
#[derive(Debug, Serialize)]
pub struct DraftEditPayload {
    pub communication: Communication,
    pub attachments: Vec<CommunicationAttachment>,
    /// The snapshot as `saved_*` field values, ready to resubmit.
    pub saved_filters: SavedFilterFields,
    pub candidates: Vec<Candidate>,
    /// Stored recipient ids that appear in `candidates`.
    pub selected_recipient_ids: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u64,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// POST /api/v1/communications
pub async fn submit(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SubmissionResult>>)> {
    let form = SubmissionForm::from_multipart(multipart).await?;
    let caller = load_caller(&state, &auth).await?;
    let result = process_submission(&state, &caller, &form, None).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// POST /api/v1/communications/drafts/{id}
///
/// Runs the submission pipeline against an existing draft of the caller.
pub async fn resubmit_draft(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<SubmissionResult>>> {
    let form = SubmissionForm::from_multipart(multipart).await?;
    let caller = load_caller(&state, &auth).await?;

    let existing = CommunicationRepo::find_by_id(&state.pool, id)
        .await?
        .filter(|c| c.sender_id == caller.user.id)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Communication",
            id,
        }))?;
    if existing.status() != CommunicationStatus::Draft {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Only drafts can be edited; this communication is {}",
            existing.status().as_str()
        ))));
    }

    let result = process_submission(&state, &caller, &form, Some(&existing)).await?;
    Ok(Json(DataResponse { data: result }))
}

fn rejected(errors: SubmissionErrors, form: &SubmissionForm) -> AppError {
    AppError::Submission {
        errors,
        submitted: form.submitted(),
    }
}

async fn process_submission(
    state: &AppState,
    caller: &Caller,
    form: &SubmissionForm,
    draft: Option<&Communication>,
) -> AppResult<SubmissionResult> {
    let now = Utc::now();

    let target_group_error = form.check_target_group(caller.role).err().map(|e| e.to_string());
    let snapshot = SavedFilterData::from_fields(&form.saved, caller.role, caller.user.branch_id);
    let predicate = predicate_for(state, caller, &snapshot.to_criteria()).await?;

    let selected = form.selected_ids();
    let recipients = RecipientRepo::allowed_contacts(&state.pool, &predicate, &selected).await?;
    if recipients.len() < selected.len() {
        tracing::debug!(
            user_id = caller.user.id,
            dropped = selected.len() - recipients.len(),
            "Selected recipients outside the allowed set were dropped"
        );
    }

    // A draft's stored files count toward the limits alongside new uploads.
    let mut attachments: Vec<AttachmentMeta> = match draft {
        Some(d) => CommunicationAttachmentRepo::list_for_communication(&state.pool, d.id)
            .await?
            .into_iter()
            .map(|a| AttachmentMeta {
                file_name: a.file_name,
                size_bytes: u64::try_from(a.size_bytes).unwrap_or(0),
            })
            .collect(),
        None => Vec::new(),
    };
    attachments.extend(form.attachment_meta());

    let (message, schedule_error) = form.message_fields();
    let reviewed = review_submission(SubmissionInput {
        caller_role: caller.role,
        message: &message,
        target_group_error,
        attachments: &attachments,
        attachment_limits: &state.config.attachment_limits,
        recipients: &recipients,
        manual_emails: &form.manual_emails,
        now,
    });

    let accepted = match (reviewed, schedule_error) {
        (Ok(accepted), None) => accepted,
        (Ok(accepted), Some(problem)) => {
            let mut errors = SubmissionErrors {
                warnings: accepted.warnings,
                ..Default::default()
            };
            errors.field("scheduled_time", problem);
            return Err(rejected(errors, form));
        }
        (Err(mut errors), Some(problem)) => {
            errors.field("scheduled_time", problem);
            return Err(rejected(errors, form));
        }
        (Err(errors), None) => return Err(rejected(errors, form)),
    };

    for warning in &accepted.warnings {
        tracing::warn!(user_id = caller.user.id, %warning, "Submission accepted with warning");
    }

    let from = draft.map_or(CommunicationStatus::Editing, Communication::status);
    state_machine::validate_transition(from, accepted.plan.target_status())
        .map_err(|e| AppError::Core(CoreError::Conflict(e)))?;

    let input = SaveCommunication {
        sender_id: caller.user.id,
        title: message.title.clone(),
        message: message.message.clone(),
        requires_response: message.requires_response,
        is_draft: message.is_draft,
        scheduled_time: message.scheduled_time,
        selected_recipient_ids: accepted.recipient_ids.clone(),
        manual_emails: accepted.manual_emails.clone(),
        saved_filter_data: snapshot,
    };
    let mut written = Vec::new();
    let communication = match persist(state, draft, &input, &form.files, &mut written).await {
        Ok(communication) => communication,
        Err(e) => {
            discard_files(&written).await;
            return Err(e);
        }
    };

    let communication = if accepted.plan == DispatchPlan::SendNow {
        let sent = send_now(
            &state.pool,
            state.delivery.as_ref(),
            communication.id,
            now,
            OnFailure::ReturnToDrafts,
        )
        .await?;
        if sent.is_none() {
            tracing::debug!(
                communication_id = communication.id,
                "Communication was claimed by the dispatcher first"
            );
        }
        CommunicationRepo::find_by_id(&state.pool, communication.id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Communication",
                id: communication.id,
            }))?
    } else {
        communication
    };
    let stored =
        CommunicationAttachmentRepo::list_for_communication(&state.pool, communication.id).await?;

    tracing::info!(
        communication_id = communication.id,
        sender_id = caller.user.id,
        recipient_count = accepted.recipient_ids.len(),
        manual_email_count = accepted.manual_emails.len(),
        attachment_count = stored.len(),
        outcome = accepted.plan.outcome(),
        "Communication submitted"
    );

    Ok(SubmissionResult {
        communication,
        outcome: accepted.plan.outcome(),
        warnings: accepted.warnings,
        attachments: stored,
    })
}

/// Save the row and its new attachments in one transaction.
///
/// Files are written before the commit; every path written is pushed onto
/// `written` so the caller can remove them if this fails.
async fn persist(
    state: &AppState,
    draft: Option<&Communication>,
    input: &SaveCommunication,
    files: &[UploadedFile],
    written: &mut Vec<PathBuf>,
) -> AppResult<Communication> {
    let mut tx = state.pool.begin().await?;

    let communication = match draft {
        Some(d) => CommunicationRepo::update_draft(&mut *tx, d.id, input)
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::Conflict(
                    "The draft was sent or deleted while being edited".into(),
                ))
            })?,
        None => CommunicationRepo::create(&mut *tx, input).await?,
    };

    store_attachments(
        &mut tx,
        &state.config.attachment_storage_dir,
        communication.id,
        files,
        written,
    )
    .await?;

    tx.commit().await?;
    Ok(communication)
}

/// Write uploads under `{storage}/{communication_id}/` and record them.
async fn store_attachments(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    storage_dir: &std::path::Path,
    communication_id: DbId,
    files: &[UploadedFile],
    written: &mut Vec<PathBuf>,
) -> AppResult<()> {
    if files.is_empty() {
        return Ok(());
    }
    let dir = storage_dir.join(communication_id.to_string());
    tokio::fs::create_dir_all(&dir).await?;

    for file in files {
        let file_name = sanitize_file_name(&file.file_name);
        let stored_name = format!("{}-{file_name}", Uuid::new_v4().simple());
        let path = dir.join(&stored_name);
        tokio::fs::write(&path, &file.data).await?;
        written.push(path);

        CommunicationAttachmentRepo::create(
            &mut **tx,
            communication_id,
            &CreateCommunicationAttachment {
                file_name,
                stored_path: format!("{communication_id}/{stored_name}"),
                content_type: file.content_type.clone(),
                size_bytes: i64::try_from(file.data.len()).unwrap_or(i64::MAX),
            },
        )
        .await?;
    }
    Ok(())
}

/// Remove files written for a submission that was rolled back.
async fn discard_files(written: &[PathBuf]) {
    for path in written {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove attachment");
        }
    }
    // Only succeeds when the directory is left empty.
    if let Some(dir) = written.first().and_then(|p| p.parent()) {
        let _ = tokio::fs::remove_dir(dir).await;
    }
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// GET /api/v1/communications/drafts/{id}
///
/// Rebuilds the candidate list from the stored snapshot. When the snapshot
/// no longer resolves to anyone, the stored recipients are listed instead.
pub async fn edit_draft(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DraftEditPayload>>> {
    let caller = load_caller(&state, &auth).await?;
    let draft = CommunicationRepo::find_draft(&state.pool, id, caller.user.id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Draft",
            id,
        }))?;

    let snapshot = draft.snapshot();
    let predicate = predicate_for(&state, &caller, &snapshot.to_criteria()).await?;
    let mut rows = RecipientRepo::resolve(&state.pool, &predicate).await?;
    if rows.is_empty() && !draft.selected_recipient_ids.is_empty() {
        rows = RecipientRepo::by_ids(&state.pool, &draft.selected_recipient_ids).await?;
    }

    let selected_recipient_ids = rows
        .iter()
        .map(|r| r.id)
        .filter(|rid| draft.selected_recipient_ids.contains(rid))
        .collect();
    let attachments = CommunicationAttachmentRepo::list_for_communication(&state.pool, id).await?;

    Ok(Json(DataResponse {
        data: DraftEditPayload {
            saved_filters: snapshot.to_fields(),
            candidates: rows.into_iter().map(Candidate::from).collect(),
            selected_recipient_ids,
            attachments,
            communication: draft,
        },
    }))
}

/// DELETE /api/v1/communications/drafts/{id}
pub async fn delete_draft(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !CommunicationRepo::delete_draft(&state.pool, id, auth.user_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Draft",
            id,
        }));
    }
    tracing::info!(communication_id = id, user_id = auth.user_id, "Draft deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/communications/drafts/delete-all
pub async fn delete_all_drafts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<DeletedCount>>> {
    let deleted = CommunicationRepo::delete_all_drafts(&state.pool, auth.user_id).await?;
    tracing::info!(user_id = auth.user_id, deleted, "All drafts deleted");
    Ok(Json(DataResponse {
        data: DeletedCount { deleted },
    }))
}
