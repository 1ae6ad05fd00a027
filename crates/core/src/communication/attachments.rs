//! Attachment limits and the bounded list of upload rows.

use serde::Serialize;

/// Hard ceiling on attachments per communication.
pub const MAX_ATTACHMENTS: usize = 10;

/// Default per-file size limit in megabytes.
pub const DEFAULT_MAX_SINGLE_MB: u64 = 10;

/// Default combined size limit in megabytes.
pub const DEFAULT_MAX_TOTAL_MB: u64 = 25;

/// Accepted file extensions, lowercase and without the dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "csv", "rtf", "odt", "jpg", "jpeg",
    "png", "gif", "zip",
];

const MB: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// Server-side validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentLimits {
    pub max_count: usize,
    pub max_single_bytes: u64,
    pub max_total_bytes: u64,
}

impl AttachmentLimits {
    /// Build limits from megabyte values. The count never exceeds
    /// [`MAX_ATTACHMENTS`].
    pub fn from_megabytes(max_count: usize, max_single_mb: u64, max_total_mb: u64) -> Self {
        Self {
            max_count: max_count.min(MAX_ATTACHMENTS),
            max_single_bytes: max_single_mb * MB,
            max_total_bytes: max_total_mb * MB,
        }
    }
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self::from_megabytes(MAX_ATTACHMENTS, DEFAULT_MAX_SINGLE_MB, DEFAULT_MAX_TOTAL_MB)
    }
}

/// What the validator needs to know about an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    pub file_name: String,
    pub size_bytes: u64,
}

/// Check count, type, and size limits. Returns one message per problem.
pub fn validate_attachments(files: &[AttachmentMeta], limits: &AttachmentLimits) -> Vec<String> {
    let mut errors = Vec::new();

    if files.len() > limits.max_count {
        errors.push(format!(
            "You can attach at most {} files.",
            limits.max_count
        ));
    }

    for file in files {
        if file.size_bytes == 0 {
            errors.push(format!("{} is empty.", file.file_name));
            continue;
        }
        if !has_allowed_extension(&file.file_name) {
            errors.push(format!("{} is not an allowed file type.", file.file_name));
        }
        if file.size_bytes > limits.max_single_bytes {
            errors.push(format!(
                "{} exceeds the {} MB limit per file.",
                file.file_name,
                limits.max_single_bytes / MB
            ));
        }
    }

    let total: u64 = files.iter().map(|f| f.size_bytes).sum();
    if total > limits.max_total_bytes {
        errors.push(format!(
            "Attachments exceed the {} MB total limit.",
            limits.max_total_bytes / MB
        ));
    }

    errors
}

fn has_allowed_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reduce an uploaded file name to a safe basename for storage.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

// ---------------------------------------------------------------------------
// Client-side upload rows
// ---------------------------------------------------------------------------

/// Form prefix for attachment fields.
pub const ATTACHMENT_PREFIX: &str = "attachments";

/// Field name of the file input at `index`.
pub fn attachment_field_name(index: usize) -> String {
    format!("{ATTACHMENT_PREFIX}-{index}-file")
}

/// The list of upload rows in the compose form.
///
/// Rows are always indexed `0..len` so field names stay contiguous after a
/// removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRows {
    files: Vec<Option<String>>,
    max: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentRowError {
    #[error("You can attach at most {0} files.")]
    Full(usize),
    #[error("No attachment row at index {0}.")]
    NoSuchRow(usize),
}

impl AttachmentRows {
    /// Start with a single empty row.
    pub fn new(max: usize) -> Self {
        let max = max.clamp(1, MAX_ATTACHMENTS);
        Self {
            files: vec![None],
            max,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Value of the `-TOTAL_FORMS` management field.
    pub fn total_forms(&self) -> usize {
        self.files.len()
    }

    /// Append an empty row and return its field name.
    pub fn add(&mut self) -> Result<String, AttachmentRowError> {
        if self.files.len() >= self.max {
            return Err(AttachmentRowError::Full(self.max));
        }
        self.files.push(None);
        Ok(attachment_field_name(self.files.len() - 1))
    }

    /// Remove a row; later rows shift down one index.
    pub fn remove(&mut self, index: usize) -> Result<(), AttachmentRowError> {
        if index >= self.files.len() {
            return Err(AttachmentRowError::NoSuchRow(index));
        }
        self.files.remove(index);
        Ok(())
    }

    pub fn choose(
        &mut self,
        index: usize,
        file_name: Option<String>,
    ) -> Result<(), AttachmentRowError> {
        let slot = self
            .files
            .get_mut(index)
            .ok_or(AttachmentRowError::NoSuchRow(index))?;
        *slot = file_name;
        Ok(())
    }

    pub fn field_names(&self) -> Vec<String> {
        (0..self.files.len()).map(attachment_field_name).collect()
    }

    /// Rows that have a file chosen, as `(field name, file name)`.
    pub fn chosen(&self) -> Vec<(String, &str)> {
        self.files
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_deref().map(|f| (attachment_field_name(i), f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn file(name: &str, size_bytes: u64) -> AttachmentMeta {
        AttachmentMeta {
            file_name: name.into(),
            size_bytes,
        }
    }

    #[test]
    fn rejects_more_than_ten_files() {
        let files: Vec<_> = (0..11).map(|i| file(&format!("f{i}.pdf"), 10)).collect();
        let errors = validate_attachments(&files, &AttachmentLimits::default());
        assert_eq!(errors, vec!["You can attach at most 10 files."]);
    }

    #[test]
    fn configured_count_is_capped() {
        assert_eq!(AttachmentLimits::from_megabytes(50, 1, 1).max_count, MAX_ATTACHMENTS);
    }

    #[test]
    fn flags_type_and_size_problems() {
        let limits = AttachmentLimits::from_megabytes(10, 1, 2);
        let errors = validate_attachments(
            &[
                file("notes.PDF", 100),
                file("run.exe", 100),
                file("big.png", 2 * MB),
                file("empty.txt", 0),
            ],
            &limits,
        );
        assert_eq!(
            errors,
            vec![
                "run.exe is not an allowed file type.",
                "big.png exceeds the 1 MB limit per file.",
                "empty.txt is empty.",
                "Attachments exceed the 2 MB total limit.",
            ]
        );
    }

    #[test]
    fn sanitizes_paths_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\term plan (v2).pdf"), "term_plan__v2_.pdf");
        assert_eq!(sanitize_file_name("..."), "attachment");
    }

    #[test]
    fn rows_are_bounded_and_reindexed() {
        let mut rows = AttachmentRows::new(3);
        assert_eq!(rows.add().unwrap(), "attachments-1-file");
        assert_eq!(rows.add().unwrap(), "attachments-2-file");
        assert_matches!(rows.add(), Err(AttachmentRowError::Full(3)));

        rows.choose(2, Some("c.pdf".into())).unwrap();
        rows.remove(0).unwrap();
        assert_eq!(rows.field_names(), vec!["attachments-0-file", "attachments-1-file"]);
        assert_eq!(rows.chosen(), vec![("attachments-1-file".to_string(), "c.pdf")]);
        assert_eq!(rows.total_forms(), 2);
    }

    #[test]
    fn row_limit_never_exceeds_ten() {
        let mut rows = AttachmentRows::new(99);
        for _ in 1..MAX_ATTACHMENTS {
            rows.add().unwrap();
        }
        assert_matches!(rows.add(), Err(AttachmentRowError::Full(10)));
        assert_matches!(rows.remove(10), Err(AttachmentRowError::NoSuchRow(10)));
    }
}
