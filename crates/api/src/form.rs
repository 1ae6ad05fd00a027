//! Multipart compose-form parsing.
//!
//! [`SubmissionForm`] holds the fields of a communication submission as
//! received. Nothing is validated here apart from the multipart framing;
//! the handler passes the parsed values to the core review.

use axum::body::Bytes;
use axum::extract::Multipart;
use lagooz_core::communication::attachments::ATTACHMENT_PREFIX;
use lagooz_core::communication::message::{parse_checkbox, parse_scheduled_time};
use lagooz_core::communication::{AttachmentMeta, MessageFields};
use lagooz_core::roles::UserRole;
use lagooz_core::targeting::{CriteriaError, FilterCriteria, SavedFilterFields};
use lagooz_core::types::{DbId, Timestamp};
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// An uploaded attachment held in memory until it is stored.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn meta(&self) -> AttachmentMeta {
        AttachmentMeta {
            file_name: self.file_name.clone(),
            size_bytes: self.data.len() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionForm {
    pub title: String,
    pub message: String,
    pub requires_response: bool,
    pub is_draft: bool,
    pub scheduled_time: String,
    pub selected_recipients: Vec<String>,
    pub manual_emails: String,
    #[serde(flatten)]
    pub saved: SavedFilterFields,
    /// Names of the files that were uploaded, for redisplay.
    pub attachment_names: Vec<String>,
    #[serde(skip)]
    pub files: Vec<UploadedFile>,
}

/// `attachments-{i}-file`
fn is_attachment_field(name: &str) -> bool {
    name.strip_prefix(ATTACHMENT_PREFIX)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix("-file"))
        .is_some_and(|index| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
}

impl SubmissionForm {
    /// Read every part of the request. Unknown text fields are ignored.
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = SubmissionForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if is_attachment_field(&name) {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                // An unused upload row arrives as an empty, unnamed part.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                form.attachment_names.push(file_name.clone());
                form.files.push(UploadedFile {
                    field_name: name,
                    file_name,
                    content_type,
                    data,
                });
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            form.set_text(&name, value);
        }

        Ok(form)
    }

    fn set_text(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "message" => self.message = value,
            "requires_response" => self.requires_response = parse_checkbox(&value),
            "is_draft" => self.is_draft = parse_checkbox(&value),
            "scheduled_time" => self.scheduled_time = value,
            "selected_recipients" | "selected_recipients[]" => self.selected_recipients.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            ),
            "manual_emails" => self.manual_emails = value,
            other => {
                self.saved.set(other, value);
            }
        }
    }

    /// Message fields, plus the schedule parse error if there was one.
    pub fn message_fields(&self) -> (MessageFields, Option<String>) {
        let (scheduled_time, schedule_error): (Option<Timestamp>, Option<String>) =
            match parse_scheduled_time(&self.scheduled_time) {
                Ok(at) => (at, None),
                Err(e) => (None, Some(e)),
            };
        let fields = MessageFields {
            title: self.title.clone(),
            message: self.message.clone(),
            requires_response: self.requires_response,
            is_draft: self.is_draft,
            scheduled_time,
        }
        .trimmed();
        (fields, schedule_error)
    }

    /// Selected ids, ascending and deduplicated. Non-numeric entries are dropped.
    pub fn selected_ids(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self
            .selected_recipients
            .iter()
            .filter_map(|v| v.parse().ok())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn attachment_meta(&self) -> Vec<AttachmentMeta> {
        self.files.iter().map(UploadedFile::meta).collect()
    }

    /// Check the `saved_*` fields the way the recipient endpoint checks its
    /// query. The branch is not the caller's to choose for family roles.
    pub fn check_target_group(
        &self,
        caller_role: UserRole,
    ) -> Result<FilterCriteria, CriteriaError> {
        let saved = &self.saved;
        let branch = if caller_role.is_family() {
            ""
        } else {
            saved.saved_branch.as_str()
        };
        FilterCriteria::from_pairs([
            ("branch", branch),
            ("role", saved.saved_role.as_str()),
            ("staff_type", saved.saved_staff_type.as_str()),
            ("student_class", saved.saved_student_class.as_str()),
            ("class_arm", saved.saved_class_arm.as_str()),
            ("teaching_positions", saved.saved_teaching_positions.as_str()),
            ("non_teaching_positions", saved.saved_non_teaching_positions.as_str()),
        ])
    }

    /// The submitted input as echoed back on a rejected submission.
    pub fn submitted(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
