//! Manually entered email addresses.

use std::collections::BTreeSet;

use validator::ValidateEmail;

/// Result of parsing the comma-separated manual email field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualEmails {
    /// Valid addresses, lowercased, in entry order without repeats.
    pub valid: Vec<String>,
    /// Entries that failed validation, as typed (trimmed).
    pub invalid: Vec<String>,
}

/// Split on commas, trim, and validate each entry.
///
/// Invalid entries are collected, not rejected; the caller turns them into
/// warnings.
pub fn parse_manual_emails(raw: &str) -> ManualEmails {
    let mut out = ManualEmails::default();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if entry.validate_email() {
            let email = entry.to_lowercase();
            if !out.valid.contains(&email) {
                out.valid.push(email);
            }
        } else {
            out.invalid.push(entry.to_string());
        }
    }
    out
}

/// Manual emails that also belong to a selected recipient, lowercased and sorted.
pub fn duplicate_emails<'a, I>(selected_emails: I, manual: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let selected: BTreeSet<String> = selected_emails
        .into_iter()
        .map(|e| e.trim().to_lowercase())
        .collect();
    let dupes: BTreeSet<String> = manual
        .iter()
        .map(|e| e.to_lowercase())
        .filter(|e| selected.contains(e))
        .collect();
    dupes.into_iter().collect()
}
