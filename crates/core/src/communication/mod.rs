//! Composing, validating, and scheduling communications.

pub mod attachments;
pub mod errors;
pub mod lifecycle;
pub mod manual_emails;
pub mod message;
pub mod submission;

pub use attachments::{AttachmentLimits, AttachmentMeta, MAX_ATTACHMENTS};
pub use errors::SubmissionErrors;
pub use lifecycle::{is_due, CommunicationStatus, DispatchPlan};
pub use message::MessageFields;
pub use submission::{review_submission, AcceptedSubmission, RecipientContact, SubmissionInput};
