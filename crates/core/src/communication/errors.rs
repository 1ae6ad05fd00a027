//! Consolidated error set for a rejected submission.

use std::collections::BTreeMap;

use serde::Serialize;

/// Every problem found in one submission, grouped the way the form shows them.
///
/// Warnings never block a submission on their own; they are carried here so
/// a rejected form still reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("submission rejected")]
pub struct SubmissionErrors {
    pub field_errors: BTreeMap<String, Vec<String>>,
    pub non_field_errors: Vec<String>,
    pub attachment_errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SubmissionErrors {
    pub fn field(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(name.into())
            .or_default()
            .push(message.into());
    }

    pub fn non_field(&mut self, message: impl Into<String>) {
        self.non_field_errors.push(message.into());
    }

    pub fn attachment(&mut self, message: impl Into<String>) {
        self.attachment_errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// True when nothing blocks the submission.
    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
            && self.non_field_errors.is_empty()
            && self.attachment_errors.is_empty()
    }

    /// Merge field errors reported by `validator`.
    pub fn extend_validation(&mut self, errors: &validator::ValidationErrors) {
        for (field, entries) in errors.field_errors() {
            for entry in entries.iter() {
                let message = entry
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| entry.code.to_string());
                self.field(field.to_string(), message);
            }
        }
    }
}
