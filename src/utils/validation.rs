use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use utoipa::ToSchema;

/// Field name -> list of messages, serialized as `{ "field": ["msg", ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(|v| v.as_slice())
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(())` when nothing was recorded, the errors otherwise.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, list) in errors.field_errors() {
            for error in list {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", error.code));
                out.add(&field, message);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub const REQUIRED: &str = "This field is required.";

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File too large. Max size is {} MB.",
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Lowercased extension of a filename, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Checks the extension against the configured allow-list.
pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<(), ValidationError> {
    match file_extension(filename) {
        Some(ext) if allowed.iter().any(|a| a == &ext) => Ok(()),
        other => Err(ValidationError {
            code: "INVALID_EXTENSION",
            message: format!(
                "File extension \"{}\" is not allowed. Allowed extensions are: {}.",
                other.unwrap_or_default(),
                allowed.join(", ")
            ),
        }),
    }
}

/// Sanitizes filename to prevent path traversal and injection attacks
/// Returns the sanitized filename or an error if the name is invalid
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Last component, whichever separator the client used
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("").trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    if name.len() != filename.len() {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        });
    }

    Ok(sanitized)
}

/// Presentation hint for a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
    Other,
}

impl FileKind {
    pub fn from_filename(filename: &str) -> Self {
        match file_extension(filename).as_deref() {
            Some("jpg" | "jpeg" | "png") => FileKind::Image,
            Some("pdf") => FileKind::Pdf,
            _ => FileKind::Other,
        }
    }
}

/// Content type served for a stored file, guessed from its extension.
pub fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// ASCII slug: lowercase alphanumerics and underscores, runs of whitespace
/// and hyphens collapsed to a single hyphen, leading/trailing `-`/`_` stripped.
/// Other characters are dropped.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug.trim_matches(|c: char| c == '-' || c == '_').to_string()
}

/// Trims a free-text value and enforces a character limit.
pub fn bounded_text(value: &str, max_chars: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError {
            code: "REQUIRED",
            message: REQUIRED.to_string(),
        });
    }
    let count = trimmed.chars().count();
    if count > max_chars {
        return Err(ValidationError {
            code: "TOO_LONG",
            message: format!(
                "Ensure this value has at most {} characters (it has {}).",
                max_chars, count
            ),
        });
    }
    Ok(trimmed.to_string())
}

/// Escapes `LIKE` wildcards so user input matches literally (escape char `\`).
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ["pdf", "docx", "zip"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_file_size() {
        let max = 50 * 1024 * 1024;
        assert!(validate_file_size(1024, max).is_ok());
        assert!(validate_file_size(max, max).is_ok());
        assert!(validate_file_size(max + 1, max).is_err());
    }

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("notes.pdf", &allowed()).is_ok());
        assert!(validate_extension("NOTES.PDF", &allowed()).is_ok());
        assert!(validate_extension("bundle.zip", &allowed()).is_ok());

        let err = validate_extension("virus.exe", &allowed()).unwrap_err();
        assert_eq!(err.code, "INVALID_EXTENSION");
        assert!(validate_extension("README", &allowed()).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test.pdf").unwrap(), "test.pdf");
        assert_eq!(sanitize_filename("my file.doc").unwrap(), "my file.doc");
        assert_eq!(
            sanitize_filename("test<script>.pdf").unwrap(),
            "test_script_.pdf"
        );
        assert_eq!(sanitize_filename("নোট.pdf").unwrap(), "নোট.pdf");

        // Path traversal
        assert_eq!(sanitize_filename("../../../etc/passwd").unwrap(), "passwd");
        assert_eq!(
            sanitize_filename("..\\..\\windows\\system32").unwrap(),
            "system32"
        );

        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename(".htaccess").is_err());
    }

    #[test]
    fn test_file_kind() {
        assert_eq!(FileKind::from_filename("a/b/scan.JPG"), FileKind::Image);
        assert_eq!(FileKind::from_filename("photo.jpeg"), FileKind::Image);
        assert_eq!(FileKind::from_filename("x.png"), FileKind::Image);
        assert_eq!(FileKind::from_filename("notes.pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_filename("slides.pptx"), FileKind::Other);
        assert_eq!(FileKind::from_filename("noext"), FileKind::Other);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.ZIP"), "application/zip");
        assert_eq!(
            content_type_for("slides.pptx"),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        );
        assert_eq!(content_type_for("avatars/u_1.png"), "image/png");
        assert_eq!(content_type_for("readme.txt"), "text/plain");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Question Papers"), "question-papers");
        assert_eq!(slugify("  1st Semester  "), "1st-semester");
        assert_eq!(slugify("Year - 1"), "year-1");
        assert_eq!(slugify("C++ & DSA!"), "c-dsa");
        assert_eq!(slugify("snake_case"), "snake_case");
        assert_eq!(slugify("_edge-"), "edge");
        assert_eq!(slugify("ঢাকা"), "");
    }

    #[test]
    fn test_bounded_text() {
        assert_eq!(bounded_text("  hi  ", 10).unwrap(), "hi");
        assert_eq!(bounded_text("   ", 10).unwrap_err().code, "REQUIRED");
        assert!(bounded_text(&"a".repeat(2000), 2000).is_ok());
        assert_eq!(
            bounded_text(&"a".repeat(2001), 2000).unwrap_err().code,
            "TOO_LONG"
        );
        // characters, not bytes
        assert!(bounded_text(&"ক".repeat(2000), 2000).is_ok());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("DSA"), "DSA");
    }

    #[test]
    fn test_field_errors() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());
        errors.add("body", REQUIRED);
        errors.add("body", "second");
        assert!(errors.contains("body"));
        assert_eq!(errors.get("body").unwrap().len(), 2);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["body"][0], REQUIRED);

        let mut other = FieldErrors::new();
        other.add("file", "bad");
        other.add("body", "third");
        errors.merge(other);
        assert_eq!(errors.get("body").unwrap().len(), 3);
        assert!(errors.contains("file"));
    }
}
