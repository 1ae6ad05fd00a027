//! Message fields of the compose form.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::Timestamp;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MessageFields {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title is required and must be at most 255 characters."
    ))]
    pub title: String,
    #[validate(length(
        min = 1,
        max = 20000,
        message = "Message is required and must be at most 20000 characters."
    ))]
    pub message: String,
    #[serde(default)]
    pub requires_response: bool,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub scheduled_time: Option<Timestamp>,
}

impl MessageFields {
    /// Trim surrounding whitespace so blank input fails the length check.
    pub fn trimmed(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.message = self.message.trim().to_string();
        self
    }
}

/// Parse a checkbox value as sent by an HTML form.
pub fn parse_checkbox(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

/// Parse a schedule timestamp from RFC 3339 or a `datetime-local` input
/// (`YYYY-MM-DDTHH:MM`, read as UTC). Blank is no schedule.
pub fn parse_scheduled_time(value: &str) -> Result<Option<Timestamp>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(at) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(Some(at.with_timezone(&chrono::Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Ok(Some(naive.and_utc()));
        }
    }
    Err(format!("'{value}' is not a valid date and time."))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn blank_title_fails_validation() {
        let fields = MessageFields {
            title: "   ".into(),
            message: "Hello".into(),
            ..Default::default()
        }
        .trimmed();
        let errors = fields.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(!errors.field_errors().contains_key("message"));
    }

    #[test]
    fn checkbox_values() {
        assert!(parse_checkbox("on"));
        assert!(parse_checkbox("True"));
        assert!(!parse_checkbox(""));
        assert!(!parse_checkbox("off"));
    }

    #[test]
    fn schedule_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 11, 2, 8, 30, 0).unwrap();
        assert_eq!(parse_scheduled_time("2026-11-02T08:30").unwrap(), Some(expected));
        assert_eq!(parse_scheduled_time("2026-11-02T09:30:00+01:00").unwrap(), Some(expected));
        assert_eq!(parse_scheduled_time(" ").unwrap(), None);
        assert!(parse_scheduled_time("next tuesday").is_err());
    }
}
