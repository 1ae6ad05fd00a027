//! Validation of a complete submission.
//!
//! [`review_submission`] is the pure part of the submit pipeline: the API
//! layer resolves the allowed recipients and loads their emails, then hands
//! everything here to get either an accepted plan or the consolidated
//! error set.

use chrono::Utc;
use validator::Validate;

use crate::roles::UserRole;
use crate::types::{DbId, Timestamp};

use super::attachments::{validate_attachments, AttachmentLimits, AttachmentMeta};
use super::errors::SubmissionErrors;
use super::lifecycle::DispatchPlan;
use super::manual_emails::{duplicate_emails, parse_manual_emails};
use super::message::MessageFields;

pub const NO_RECIPIENT: &str = "Please select at least one recipient.";
pub const NO_RECIPIENT_MANUAL_HINT: &str = " Or provide a valid manual email.";
pub const MANUAL_EMAILS_UNAVAILABLE: &str =
    "Manual emails are not available for your role and were ignored.";

/// A selected recipient that is inside the caller's allowed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientContact {
    pub id: DbId,
    pub email: String,
}

pub struct SubmissionInput<'a> {
    pub caller_role: UserRole,
    pub message: &'a MessageFields,
    /// Set when the submitted filter snapshot could not be accepted.
    pub target_group_error: Option<String>,
    pub attachments: &'a [AttachmentMeta],
    pub attachment_limits: &'a AttachmentLimits,
    /// Selected ids intersected with the allowed set.
    pub recipients: &'a [RecipientContact],
    /// Raw comma-separated manual email field.
    pub manual_emails: &'a str,
    pub now: Timestamp,
}

impl<'a> SubmissionInput<'a> {
    pub fn new(caller_role: UserRole, message: &'a MessageFields) -> Self {
        Self {
            caller_role,
            message,
            target_group_error: None,
            attachments: &[],
            attachment_limits: &DEFAULT_LIMITS,
            recipients: &[],
            manual_emails: "",
            now: Utc::now(),
        }
    }
}

static DEFAULT_LIMITS: AttachmentLimits = AttachmentLimits {
    max_count: super::attachments::MAX_ATTACHMENTS,
    max_single_bytes: super::attachments::DEFAULT_MAX_SINGLE_MB * 1024 * 1024,
    max_total_bytes: super::attachments::DEFAULT_MAX_TOTAL_MB * 1024 * 1024,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedSubmission {
    /// Frozen recipient ids, ascending.
    pub recipient_ids: Vec<DbId>,
    pub manual_emails: Vec<String>,
    pub warnings: Vec<String>,
    pub plan: DispatchPlan,
}

/// Check every rule at once and either accept or reject with all problems.
pub fn review_submission(
    input: SubmissionInput<'_>,
) -> Result<AcceptedSubmission, SubmissionErrors> {
    let mut errors = SubmissionErrors::default();

    if let Some(problem) = &input.target_group_error {
        errors.non_field(format!("Invalid target group filters: {problem}"));
    }

    if let Err(validation) = input.message.validate() {
        errors.extend_validation(&validation);
    }

    for problem in validate_attachments(input.attachments, input.attachment_limits) {
        errors.attachment(problem);
    }

    let manual = if input.caller_role.is_staff_like() {
        let parsed = parse_manual_emails(input.manual_emails);
        for invalid in &parsed.invalid {
            errors.warn(format!("Invalid manual email skipped: {invalid}"));
        }
        parsed.valid
    } else {
        if !input.manual_emails.trim().is_empty() {
            errors.warn(MANUAL_EMAILS_UNAVAILABLE);
        }
        Vec::new()
    };

    if input.recipients.is_empty() && manual.is_empty() {
        let mut message = NO_RECIPIENT.to_string();
        if input.caller_role.is_staff_like() {
            message.push_str(NO_RECIPIENT_MANUAL_HINT);
        }
        errors.non_field(message);
    }

    let dupes = duplicate_emails(input.recipients.iter().map(|r| r.email.as_str()), &manual);
    if !dupes.is_empty() {
        errors.non_field(format!("Duplicate manual email(s): {}", dupes.join(", ")));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut recipient_ids: Vec<DbId> = input.recipients.iter().map(|r| r.id).collect();
    recipient_ids.sort_unstable();
    recipient_ids.dedup();

    Ok(AcceptedSubmission {
        recipient_ids,
        manual_emails: manual,
        warnings: errors.warnings,
        plan: DispatchPlan::decide(
            input.message.is_draft,
            input.message.scheduled_time,
            input.now,
        ),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;

    use super::*;

    fn message() -> MessageFields {
        MessageFields {
            title: "Sports day".into(),
            message: "Kit required.".into(),
            ..Default::default()
        }
    }

    fn contact(id: DbId, email: &str) -> RecipientContact {
        RecipientContact {
            id,
            email: email.into(),
        }
    }

    #[test]
    fn zero_recipients_is_a_non_field_error() {
        let msg = message();
        let errors =
            review_submission(SubmissionInput::new(UserRole::BranchAdmin, &msg)).unwrap_err();
        assert_eq!(
            errors.non_field_errors,
            vec!["Please select at least one recipient. Or provide a valid manual email."]
        );

        let errors = review_submission(SubmissionInput {
            manual_emails: "not-an-email",
            ..SubmissionInput::new(UserRole::Staff, &msg)
        })
        .unwrap_err();
        assert_eq!(errors.non_field_errors.len(), 1);
        assert_eq!(errors.warnings, vec!["Invalid manual email skipped: not-an-email"]);
    }

    #[test]
    fn family_callers_get_the_short_message() {
        let msg = message();
        let errors = review_submission(SubmissionInput::new(UserRole::Parent, &msg)).unwrap_err();
        assert_eq!(errors.non_field_errors, vec![NO_RECIPIENT]);
    }

    #[test]
    fn duplicate_manual_email_is_named() {
        let msg = message();
        let recipients = [contact(3, "a@x.com")];
        let errors = review_submission(SubmissionInput {
            recipients: &recipients,
            manual_emails: "A@X.com",
            ..SubmissionInput::new(UserRole::Superadmin, &msg)
        })
        .unwrap_err();
        assert_eq!(errors.non_field_errors, vec!["Duplicate manual email(s): a@x.com"]);
    }

    #[test]
    fn collects_every_problem_at_once() {
        let msg = MessageFields {
            title: String::new(),
            ..message()
        };
        let files: Vec<_> = (0..11)
            .map(|i| AttachmentMeta {
                file_name: format!("{i}.pdf"),
                size_bytes: 1,
            })
            .collect();
        let errors = review_submission(SubmissionInput {
            target_group_error: Some("'x' is not a valid branch".into()),
            attachments: &files,
            ..SubmissionInput::new(UserRole::Staff, &msg)
        })
        .unwrap_err();

        assert!(errors.field_errors.contains_key("title"));
        assert_eq!(errors.attachment_errors.len(), 1);
        assert_eq!(errors.non_field_errors.len(), 2);
    }

    #[test]
    fn manual_emails_alone_are_enough_for_staff() {
        let msg = message();
        let accepted = review_submission(SubmissionInput {
            manual_emails: "guardian@home.test, oops",
            ..SubmissionInput::new(UserRole::Staff, &msg)
        })
        .unwrap();
        assert!(accepted.recipient_ids.is_empty());
        assert_eq!(accepted.manual_emails, vec!["guardian@home.test"]);
        assert_eq!(accepted.warnings.len(), 1);
        assert_eq!(accepted.plan, DispatchPlan::SendNow);
    }

    #[test]
    fn family_manual_emails_are_ignored_with_a_warning() {
        let msg = message();
        let recipients = [contact(1, "teacher@school.test")];
        let accepted = review_submission(SubmissionInput {
            recipients: &recipients,
            manual_emails: "someone@else.test",
            ..SubmissionInput::new(UserRole::Student, &msg)
        })
        .unwrap();
        assert!(accepted.manual_emails.is_empty());
        assert_eq!(accepted.warnings, vec![MANUAL_EMAILS_UNAVAILABLE]);
    }

    #[test]
    fn plan_follows_draft_and_schedule_flags() {
        let now = Utc::now();
        let later = now + Duration::days(1);
        let recipients = [contact(2, "b@x.com"), contact(1, "a@x.com"), contact(2, "b@x.com")];

        let scheduled = MessageFields {
            scheduled_time: Some(later),
            ..message()
        };
        let accepted = review_submission(SubmissionInput {
            recipients: &recipients,
            now,
            ..SubmissionInput::new(UserRole::Staff, &scheduled)
        })
        .unwrap();
        assert_eq!(accepted.recipient_ids, vec![1, 2]);
        assert_matches!(accepted.plan, DispatchPlan::Schedule(at) if at == later);

        let draft = MessageFields {
            is_draft: true,
            ..scheduled
        };
        let accepted = review_submission(SubmissionInput {
            recipients: &recipients,
            now,
            ..SubmissionInput::new(UserRole::Staff, &draft)
        })
        .unwrap();
        assert_eq!(accepted.plan, DispatchPlan::SaveDraft);
    }
}
